//! Task tool - Delegate work to a sub-agent
//!
//! This tool is schema-only. Spawning a child session needs orchestrator
//! state (database handle, session hierarchy, turn budgets), so the
//! orchestrator intercepts `task` calls before this body would run. The
//! inert execute exists so the tool can live in the registry like any other.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::registry::{codes, ExecutionContext, Tool, ToolResult};

pub const MAX_TASK_TURNS: usize = 50;

pub struct TaskTool;

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &str {
        "task"
    }

    fn description(&self) -> &str {
        "Delegate a sub-task to a separate agent with its own session and turn budget. \
         Use subagent_type to pick the agent (e.g. 'explore' for read-only investigation); \
         set run_in_background to continue without waiting."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "Short (3-5 word) description of the task"
                },
                "prompt": {
                    "type": "string",
                    "description": "The full task prompt for the sub-agent"
                },
                "subagent_type": {
                    "type": "string",
                    "description": "Agent configuration to run the task with (e.g. 'default', 'explore', 'plan')"
                },
                "max_turns": {
                    "type": "number",
                    "description": "Turn budget override (max 50)"
                },
                "model": {
                    "type": "string",
                    "description": "Model alias override for the sub-agent"
                },
                "run_in_background": {
                    "type": "boolean",
                    "description": "Return immediately with a session id instead of waiting",
                    "default": false
                },
                "resume": {
                    "type": "string",
                    "description": "Child session id to continue instead of starting fresh"
                }
            },
            "required": ["description", "prompt", "subagent_type"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, _params: Value, _ctx: &ExecutionContext) -> ToolResult {
        // Reached only if a caller bypasses the orchestrator.
        ToolResult::fail(
            codes::TOOL_ERROR,
            "Task must run through the orchestrator",
            "The task tool spawns sub-agent sessions and is executed by the orchestrator, \
             not by direct invocation.",
        )
    }
}
