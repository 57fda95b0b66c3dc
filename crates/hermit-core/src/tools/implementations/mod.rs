//! Built-in tool implementations
//!
//! Core tools:
//! - read: Read files with line numbers
//! - write: Create/overwrite files
//! - edit: Literal string replacement with a uniqueness invariant
//! - glob: Find files by pattern
//! - grep: Regex content search
//! - list: Directory listing
//! - bash: Shell execution with bounded output
//! - task: Sub-agent delegation (schema only; executed by the orchestrator)

pub mod bash;
pub mod edit;
pub mod glob;
pub mod grep;
pub mod list;
pub mod read;
pub mod task;
pub mod write;

pub use bash::BashTool;
pub use edit::EditTool;
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use list::ListTool;
pub use read::ReadTool;
pub use task::TaskTool;
pub use write::WriteTool;

use std::sync::Arc;

use crate::tools::registry::{ToolCategory, ToolRegistry};

/// Register all built-in tools. Safe to call more than once: the registry
/// keeps the first registration of each name.
pub async fn register_all_tools(registry: &ToolRegistry) {
    registry
        .register(Arc::new(ReadTool), ToolCategory::Filesystem, false)
        .await;
    registry
        .register(Arc::new(WriteTool), ToolCategory::Filesystem, false)
        .await;
    registry
        .register(Arc::new(EditTool), ToolCategory::Filesystem, false)
        .await;
    registry
        .register(Arc::new(ListTool), ToolCategory::Filesystem, false)
        .await;
    registry
        .register(Arc::new(GlobTool), ToolCategory::Search, false)
        .await;
    registry
        .register(Arc::new(GrepTool), ToolCategory::Search, false)
        .await;
    registry
        .register(Arc::new(BashTool), ToolCategory::Execution, true)
        .await;
    registry
        .register(Arc::new(TaskTool), ToolCategory::Agent, false)
        .await;
}
