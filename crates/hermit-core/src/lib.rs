//! Hermit core library
//!
//! A host runtime that lets a language-model-driven agent act on a project
//! workspace. The pieces, leaf-first:
//!
//! - `tools` - the tool registry, sandboxing primitives, and the built-in
//!   tool implementations (read, write, edit, glob, grep, list, bash, task)
//! - `agents` - agent configuration resolution: built-in agents, per-project
//!   custom agents, tool-set filtering
//! - `agent` - the orchestrator: the multi-turn tool-calling loop and
//!   sub-agent session spawning
//! - `ai` - provider-facing types and the `CompletionClient` interface
//! - `storage` - SQLite persistence for sessions, messages, custom agents,
//!   and credentials

pub mod agent;
pub mod agents;
pub mod ai;
pub mod storage;
pub mod tools;

pub use agent::{LoopEvent, Orchestrator, OrchestratorServices, RunError, RunOptions, RunOutcome};
pub use agents::{AgentConfig, AgentMode, AgentRegistry};
pub use ai::{CallOptions, CompletionClient, StreamPart};
pub use storage::{Database, MessageStore, SessionStore};
pub use tools::{
    register_all_tools, ExecutionContext, Tool, ToolCategory, ToolRegistry, ToolResult, ToolSet,
};
