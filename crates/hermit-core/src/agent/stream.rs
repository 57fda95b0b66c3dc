//! Stream accumulation for the turn loop
//!
//! Consumes `StreamPart`s from `CompletionClient::stream()`, re-emits
//! `LoopEvent`s as chunks arrive, and returns the accumulated result once
//! the stream completes, errors, or stalls.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::ai::client::StreamPart;
use crate::ai::types::{AiToolCall, FinishReason, Usage};

use super::loop_events::{emit, EventSink, LoopEvent};

/// Abort a completion if the provider sends nothing for this long.
const STREAM_STALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Accumulated result of one streamed completion.
pub(crate) struct StreamResult {
    pub text: String,
    pub tool_calls: Vec<AiToolCall>,
    pub usage: Usage,
    pub finish_reason: FinishReason,
    /// Set when the provider reported a terminal error mid-stream.
    pub provider_error: Option<String>,
}

pub(crate) async fn process_stream(
    mut rx: mpsc::UnboundedReceiver<StreamPart>,
    events: &EventSink,
) -> StreamResult {
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    let mut usage = Usage::default();
    let mut finish_reason = FinishReason::Stop;
    let mut provider_error = None;

    loop {
        let part = match tokio::time::timeout(STREAM_STALL_TIMEOUT, rx.recv()).await {
            Ok(Some(part)) => part,
            Ok(None) => break,
            Err(_) => {
                provider_error = Some(format!(
                    "Completion stream stalled: no data for {} seconds",
                    STREAM_STALL_TIMEOUT.as_secs()
                ));
                break;
            }
        };

        match part {
            StreamPart::TextDelta { delta } => {
                text.push_str(&delta);
                emit(events, LoopEvent::TextDelta { delta });
            }
            StreamPart::ToolCallStart { id, name } => {
                emit(events, LoopEvent::ToolCallStart { id, name });
            }
            StreamPart::ToolCallComplete { tool_call } => {
                emit(
                    events,
                    LoopEvent::ToolCallComplete {
                        id: tool_call.id.clone(),
                        name: tool_call.name.clone(),
                        arguments: tool_call.arguments.clone(),
                    },
                );
                tool_calls.push(tool_call);
            }
            StreamPart::Usage { usage: u } => {
                usage.add(&u);
                emit(
                    events,
                    LoopEvent::Usage {
                        input_tokens: u.input_tokens,
                        output_tokens: u.output_tokens,
                    },
                );
            }
            StreamPart::Finish { reason } => {
                finish_reason = reason;
            }
            StreamPart::Error { error } => {
                emit(events, LoopEvent::Error {
                    error: error.clone(),
                });
                provider_error = Some(error);
                break;
            }
        }
    }

    StreamResult {
        text,
        tool_calls,
        usage,
        finish_reason,
        provider_error,
    }
}
