//! Repeated tool failure detection
//!
//! Tracks failure signatures across turns and trips a fail-fast when the
//! same tool keeps failing the same way with the same arguments, instead of
//! letting the model burn its whole turn budget retrying.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::ai::types::{AiToolCall, Content};

/// Stop after this many identical failures.
pub const REPEATED_FAILURE_THRESHOLD: usize = 2;

/// Inspect one turn's tool results. Returns a diagnostic when a
/// tool+code+message+arguments signature reaches the threshold. Any success
/// clears all counters - the agent recovered.
pub(crate) fn detect_repeated_failures(
    counters: &mut HashMap<String, usize>,
    tool_calls: &[AiToolCall],
    tool_results: &[Content],
) -> Option<String> {
    let mut call_meta: HashMap<&str, (&str, u64)> = HashMap::new();
    for call in tool_calls {
        call_meta.insert(call.id.as_str(), (call.name.as_str(), hash_arguments(&call.arguments)));
    }

    let mut saw_success = false;

    for result in tool_results {
        let Content::ToolResult {
            tool_use_id,
            output,
            is_error,
        } = result
        else {
            continue;
        };

        if !is_error.unwrap_or(false) {
            saw_success = true;
            continue;
        }

        let Some((tool_name, args_hash)) = call_meta.get(tool_use_id.as_str()) else {
            continue;
        };

        let code = output
            .get("metadata")
            .and_then(|m| m.get("code"))
            .and_then(|c| c.as_str())
            .unwrap_or("tool_error");
        let message = output
            .get("output")
            .and_then(|o| o.as_str())
            .or_else(|| output.get("title").and_then(|t| t.as_str()))
            .unwrap_or_default();

        let signature = format!(
            "{}|{}|{}|{}",
            tool_name,
            code,
            normalize_fingerprint(message),
            args_hash
        );
        let count = counters
            .entry(signature)
            .and_modify(|c| *c += 1)
            .or_insert(1);

        if *count >= REPEATED_FAILURE_THRESHOLD {
            return Some(format!(
                "Stopping tool loop: '{}' failed {} times with the same '{}' error. \
                 A different strategy is required.",
                tool_name, *count, code
            ));
        }
    }

    if saw_success {
        counters.clear();
    }

    None
}

fn hash_arguments(arguments: &serde_json::Value) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    arguments.to_string().hash(&mut hasher);
    hasher.finish()
}

fn normalize_fingerprint(message: &str) -> String {
    let mut compact = message
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if compact.is_empty() {
        return "unknown".to_string();
    }
    compact.make_ascii_lowercase();
    compact.chars().take(160).collect()
}
