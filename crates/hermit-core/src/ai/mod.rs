//! Provider-facing types and interfaces
//!
//! The completion provider itself (Anthropic, OpenAI-compatible, ...) lives
//! outside this crate. The orchestrator only depends on the
//! `CompletionClient` trait and the wire types below.

pub mod client;
pub mod types;

pub use client::{CallOptions, CompletionClient, StreamPart};
pub use types::{AiTool, AiToolCall, Content, FinishReason, ModelMessage, Role, Usage};
