//! Output bounding for tool results
//!
//! Dual-limit (lines + bytes) head/tail truncation with a visible notice,
//! plus `CappedSink`: a per-stream sink that stops accepting once full so
//! runaway process output never accumulates in memory.

/// Result of a truncation operation
pub struct TruncationResult {
    pub text: String,
    pub was_truncated: bool,
    pub lines_shown: usize,
    pub lines_total: usize,
}

impl TruncationResult {
    /// Format a truncation notice for appending to output
    pub fn notice(&self) -> Option<String> {
        if !self.was_truncated {
            return None;
        }
        Some(format!(
            "\n[Output truncated: showing {} of {} lines]",
            self.lines_shown, self.lines_total,
        ))
    }
}

/// Head-truncate: keep the first `max_lines` lines within `max_bytes`.
pub fn truncate_head(text: &str, max_lines: usize, max_bytes: usize) -> TruncationResult {
    let lines: Vec<&str> = text.lines().collect();
    let lines_total = lines.len();

    if lines_total <= max_lines && text.len() <= max_bytes {
        return TruncationResult {
            text: text.to_string(),
            was_truncated: false,
            lines_shown: lines_total,
            lines_total,
        };
    }

    let line_limited = &lines[..lines_total.min(max_lines)];
    let joined = line_limited.join("\n");

    let (final_text, lines_shown) = if joined.len() > max_bytes {
        let cutoff = floor_char_boundary(&joined, max_bytes);
        let cutoff = joined[..cutoff].rfind('\n').unwrap_or(cutoff);
        let trimmed = &joined[..cutoff];
        (trimmed.to_string(), trimmed.lines().count())
    } else {
        (joined, line_limited.len())
    };

    TruncationResult {
        text: final_text,
        was_truncated: true,
        lines_shown,
        lines_total,
    }
}

/// Clip a single line to `max_chars` characters, appending an ellipsis
/// marker when anything was cut.
pub fn clip_line(line: &str, max_chars: usize) -> String {
    if line.chars().count() <= max_chars {
        return line.to_string();
    }
    let clipped: String = line.chars().take(max_chars).collect();
    format!("{}…", clipped)
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut boundary = index.min(text.len());
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

/// Character-capped output sink. Once full, further input is counted and
/// discarded - not buffered and trimmed later - so memory stays bounded no
/// matter how much a process prints.
pub struct CappedSink {
    buffer: String,
    max_chars: usize,
    discarded_chars: usize,
}

impl CappedSink {
    pub fn new(max_chars: usize) -> Self {
        Self {
            buffer: String::new(),
            max_chars,
            discarded_chars: 0,
        }
    }

    pub fn push(&mut self, chunk: &str) {
        let used = self.buffer.chars().count();
        if used >= self.max_chars {
            self.discarded_chars += chunk.chars().count();
            return;
        }

        let remaining = self.max_chars - used;
        let chunk_chars = chunk.chars().count();
        if chunk_chars <= remaining {
            self.buffer.push_str(chunk);
        } else {
            self.buffer.extend(chunk.chars().take(remaining));
            self.discarded_chars += chunk_chars - remaining;
        }
    }

    pub fn push_line(&mut self, line: &str) {
        self.push(line);
        self.push("\n");
    }

    pub fn is_truncated(&self) -> bool {
        self.discarded_chars > 0
    }

    /// Final text, with a visible marker when output was discarded.
    pub fn into_text(self) -> String {
        if self.discarded_chars == 0 {
            return self.buffer;
        }
        format!(
            "{}\n[Output truncated: {} further characters discarded]",
            self.buffer, self.discarded_chars
        )
    }
}
