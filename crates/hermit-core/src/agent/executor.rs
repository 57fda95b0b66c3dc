//! Tool-call execution for the turn loop
//!
//! Results are produced in the order the model requested the calls and fed
//! back before the next model step. Every outcome - including unknown tools
//! and tool failures - becomes a structured `tool_result` content block; no
//! tool call can abort the loop.

use crate::ai::types::{AiToolCall, Content};
use crate::tools::registry::{ToolResult, ToolSet};

use super::loop_events::{emit, EventSink, LoopEvent};

/// Cap on tool output persisted and fed back to the model.
pub(crate) const MAX_TOOL_OUTPUT_CHARS: usize = 30_000;

/// Execute one non-task tool call through the exported tool set.
pub(crate) async fn execute_tool_call(
    call: &AiToolCall,
    toolset: &ToolSet,
    events: &EventSink,
) -> Content {
    emit(
        events,
        LoopEvent::ToolExecuting {
            id: call.id.clone(),
            name: call.name.clone(),
        },
    );

    let result = toolset
        .invoke_as(Some(&call.id), &call.name, call.arguments.clone())
        .await;
    finalize(call, result, events)
}

/// Bound a result's output, emit its event, and fold it into message content.
pub(crate) fn finalize(call: &AiToolCall, mut result: ToolResult, events: &EventSink) -> Content {
    result.output = truncate_output(&result.output);

    emit(
        events,
        LoopEvent::ToolResult {
            id: call.id.clone(),
            title: result.title.clone(),
            output: result.output.clone(),
            success: result.success,
        },
    );

    Content::ToolResult {
        tool_use_id: call.id.clone(),
        output: result.to_value(),
        is_error: if result.success { None } else { Some(true) },
    }
}

pub(crate) fn truncate_output(output: &str) -> String {
    if output.len() <= MAX_TOOL_OUTPUT_CHARS {
        return output.to_string();
    }

    let truncated_len = floor_char_boundary(output, MAX_TOOL_OUTPUT_CHARS);
    let truncated = &output[..truncated_len];
    let break_point = truncated.rfind('\n').unwrap_or(truncated_len);
    let clean = &output[..break_point];
    format!(
        "{}\n\n[... output truncated: {} chars -> {} chars ...]",
        clean,
        output.len(),
        clean.len()
    )
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut boundary = index.min(text.len());
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}
