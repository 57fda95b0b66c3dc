//! Tool layer: registry, sandboxing primitives, built-in implementations

pub mod implementations;
pub mod path_guard;
pub mod registry;
pub mod truncation;

pub use implementations::register_all_tools;
pub use registry::{
    codes, parse_params, ExecutionContext, RegisteredTool, Tool, ToolCategory, ToolProgress,
    ToolRegistry, ToolResult, ToolSet,
};
