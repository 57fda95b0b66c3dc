//! Event protocol for the turn loop
//!
//! `LoopEvent` is everything the orchestrator emits while a run is in
//! flight. Consumers (CLI, server, tests) subscribe via an unbounded channel
//! passed in `RunOptions`; a run without a subscriber emits nothing.

use serde::Serialize;
use tokio::sync::mpsc;

/// Events emitted by the orchestrator during a run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    /// Text content delta from the model.
    TextDelta { delta: String },

    /// The model started streaming a tool call.
    ToolCallStart { id: String, name: String },

    /// Tool call arguments fully received.
    ToolCallComplete {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },

    /// A tool is being executed.
    ToolExecuting { id: String, name: String },

    /// Intermediate metadata from a running tool.
    ToolProgress {
        id: String,
        metadata: serde_json::Value,
    },

    /// Tool execution completed.
    ToolResult {
        id: String,
        title: String,
        output: String,
        success: bool,
    },

    /// A sub-agent session was spawned for a task call.
    TaskSpawned {
        session_id: String,
        background: bool,
    },

    /// One model step (and its tool calls) completed.
    TurnComplete { turn: usize, has_more: bool },

    /// Token usage for one completion.
    Usage {
        input_tokens: usize,
        output_tokens: usize,
    },

    /// The run finished.
    Finished { session_id: String },

    /// An error surfaced mid-run (the run may still finish cleanly).
    Error { error: String },
}

/// Optional event subscriber for one run.
pub type EventSink = Option<mpsc::UnboundedSender<LoopEvent>>;

/// Send an event if anyone is listening. A closed receiver is not an error.
pub(crate) fn emit(sink: &EventSink, event: LoopEvent) {
    if let Some(tx) = sink {
        let _ = tx.send(event);
    }
}
