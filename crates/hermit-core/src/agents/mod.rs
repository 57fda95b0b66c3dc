//! Agent configuration: built-in agents, per-project custom agents, and
//! tool-set resolution

pub mod config;
pub mod registry;

pub use config::{merge, AgentConfig, AgentMode, AgentOverrides};
pub use registry::{AgentRegistry, ListFilter};
