//! Grep tool - Regex search across project files
//!
//! The pattern is validated before any file I/O. Oversized files and files
//! that look binary (null byte in the first 1 KiB) are skipped.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use walkdir::WalkDir;

use crate::tools::registry::{codes, parse_params, ExecutionContext, Tool, ToolResult};
use crate::tools::truncation::clip_line;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 100;
const MAX_CONTEXT_LINES: usize = 10;
const MAX_FILE_BYTES: u64 = 1024 * 1024;
const BINARY_SNIFF_BYTES: usize = 1024;
const MAX_REPORTED_LINE_CHARS: usize = 200;

pub struct GrepTool;

#[derive(Deserialize)]
struct Params {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    file_pattern: Option<String>,
    #[serde(default)]
    case_insensitive: bool,
    #[serde(default)]
    context_lines: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search file contents with a regex. Reports file, 1-based line number, and optional context lines."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regular expression to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in (default: project root)"
                },
                "file_pattern": {
                    "type": "string",
                    "description": "Glob pattern restricting which files are scanned (e.g. *.rs)"
                },
                "case_insensitive": {
                    "type": "boolean",
                    "description": "Case-insensitive matching (default: false)"
                },
                "context_lines": {
                    "type": "number",
                    "description": "Lines of context around each match (max 10)"
                },
                "limit": {
                    "type": "number",
                    "description": "Maximum number of matches (max 100)"
                }
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        // Validate the regex before touching any file.
        let regex = match regex::RegexBuilder::new(&params.pattern)
            .case_insensitive(params.case_insensitive)
            .build()
        {
            Ok(r) => r,
            Err(e) => {
                return ToolResult::fail(
                    codes::INVALID_PATTERN,
                    "Invalid regex",
                    format!("'{}': {}", params.pattern, e),
                )
            }
        };

        let file_pattern = match params.file_pattern.as_deref().map(glob::Pattern::new) {
            Some(Ok(p)) => Some(p),
            Some(Err(e)) => {
                return ToolResult::fail(
                    codes::INVALID_PATTERN,
                    "Invalid file pattern",
                    format!("{}", e),
                )
            }
            None => None,
        };

        let root = match &params.path {
            Some(p) => match ctx.resolve_existing(p) {
                Ok(r) => r,
                Err(e) => return e,
            },
            None => ctx.project_path.clone(),
        };

        let context_lines = params.context_lines.unwrap_or(0).min(MAX_CONTEXT_LINES);
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

        let mut output = String::new();
        let mut match_count = 0usize;
        let mut files_scanned = 0usize;
        let mut hit_limit = false;

        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !e
                        .file_name()
                        .to_str()
                        .map(|name| name.starts_with('.'))
                        .unwrap_or(false)
            });

        'files: for entry in walker.filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_path_buf();

            if let Some(fp) = &file_pattern {
                let matches_name = entry
                    .path()
                    .file_name()
                    .map(|n| fp.matches(&n.to_string_lossy()))
                    .unwrap_or(false);
                if !fp.matches_path(&relative) && !matches_name {
                    continue;
                }
            }

            if entry.metadata().map(|m| m.len()).unwrap_or(0) > MAX_FILE_BYTES {
                continue;
            }

            let bytes = match tokio::fs::read(entry.path()).await {
                Ok(b) => b,
                Err(_) => continue,
            };

            let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
            if sniff.contains(&0) {
                continue;
            }

            let content = String::from_utf8_lossy(&bytes);
            let lines: Vec<&str> = content.lines().collect();
            files_scanned += 1;

            for (idx, line) in lines.iter().enumerate() {
                if !regex.is_match(line) {
                    continue;
                }

                let display = relative.to_string_lossy();
                if context_lines > 0 {
                    let start = idx.saturating_sub(context_lines);
                    let end = (idx + context_lines + 1).min(lines.len());
                    for (ctx_idx, ctx_line) in lines[start..end].iter().enumerate() {
                        let line_no = start + ctx_idx + 1;
                        let sep = if start + ctx_idx == idx { ':' } else { '-' };
                        output.push_str(&format!(
                            "{}{}{}{}{}\n",
                            display,
                            sep,
                            line_no,
                            sep,
                            clip_line(ctx_line, MAX_REPORTED_LINE_CHARS)
                        ));
                    }
                    output.push_str("--\n");
                } else {
                    output.push_str(&format!(
                        "{}:{}:{}\n",
                        display,
                        idx + 1,
                        clip_line(line, MAX_REPORTED_LINE_CHARS)
                    ));
                }

                match_count += 1;
                if match_count >= limit {
                    hit_limit = true;
                    break 'files;
                }
            }
        }

        if hit_limit {
            output.push_str(&format!("[Stopped at {} matches]\n", limit));
        }

        ToolResult::ok_with(
            format!("{} match(es) for /{}/", match_count, params.pattern),
            output,
            json!({
                "matches": match_count,
                "files_scanned": files_scanned,
                "truncated": hit_limit,
            }),
        )
    }
}
