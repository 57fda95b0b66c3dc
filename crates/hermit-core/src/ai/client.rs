//! Completion provider interface
//!
//! The orchestrator talks to the model through `CompletionClient`: one
//! streamed completion per turn, delivered as `StreamPart`s over an mpsc
//! channel. Concrete providers implement this trait outside the core;
//! orchestrator tests use a scripted in-memory client.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::ai::types::{AiTool, AiToolCall, FinishReason, ModelMessage, Usage};

/// Per-call options, resolved from agent defaults and caller overrides
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Model identifier; `None` means the provider's configured default
    pub model: Option<String>,
    pub system: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub tools: Vec<AiTool>,
}

/// Incremental events from a streamed completion
#[derive(Debug, Clone)]
pub enum StreamPart {
    /// Text content delta
    TextDelta { delta: String },

    /// The model started streaming a tool call (arguments incomplete)
    ToolCallStart { id: String, name: String },

    /// Tool call arguments fully received
    ToolCallComplete { tool_call: AiToolCall },

    /// Token usage for this completion
    Usage { usage: Usage },

    /// Stream finished
    Finish { reason: FinishReason },

    /// Terminal provider error; no further parts follow
    Error { error: String },
}

/// A streamed completion provider.
///
/// `stream` returns a channel receiver immediately; parts arrive as the
/// provider produces them. A call that cannot even be started (bad
/// credentials, connection refused) returns `Err` instead of a receiver.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn stream(
        &self,
        messages: Vec<ModelMessage>,
        options: &CallOptions,
    ) -> anyhow::Result<mpsc::UnboundedReceiver<StreamPart>>;
}
