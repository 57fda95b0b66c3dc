//! Sub-agent task spawning
//!
//! The orchestrator intercepts `task` tool calls and routes them here. A
//! spawn request resolves to a child agent configuration, a model, a turn
//! budget, and a child session linked to its parent - then either runs
//! inline (result folded back as the tool output) or detaches into the
//! background, returning the child session id immediately.

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::agents::AgentRegistry;
use crate::ai::types::AiToolCall;
use crate::storage::{NewSession, SessionRecord};
use crate::tools::implementations::task::MAX_TASK_TURNS;
use crate::tools::registry::{codes, parse_params, ToolResult};

use super::loop_events::{emit, EventSink, LoopEvent};
use super::orchestrator::{Orchestrator, RunError, RunOptions, RunOutcome};

/// Arguments of a `task` tool call.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSpawnRequest {
    pub description: String,
    pub prompt: String,
    pub subagent_type: String,
    #[serde(default)]
    pub max_turns: Option<usize>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub run_in_background: bool,
    #[serde(default)]
    pub resume: Option<String>,
}

pub(crate) fn execute_task_call<'a>(
    orchestrator: &'a Orchestrator,
    parent: &'a SessionRecord,
    parent_opts: &'a RunOptions,
    parent_model: Option<&'a str>,
    call: &'a AiToolCall,
    events: &'a EventSink,
) -> Pin<Box<dyn Future<Output = ToolResult> + Send + 'a>> {
    Box::pin(async move {
    let req = match parse_params::<TaskSpawnRequest>(call.arguments.clone()) {
        Ok(r) => r,
        Err(e) => return e,
    };

    let project_path = parent_opts
        .project_path
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .or_else(|| parent.working_dir.clone());

    // Unknown subagent types fall back to the generic default.
    let child_agent = AgentRegistry::get(
        Some(orchestrator.db()),
        &req.subagent_type,
        project_path.as_deref(),
    )
    .or_else(|| AgentRegistry::get(None, "default", None));
    let Some(child_agent) = child_agent else {
        return ToolResult::fail(
            codes::NOT_FOUND,
            "No agent available",
            format!("Unknown subagent_type '{}'", req.subagent_type),
        );
    };

    // Explicit alias wins, then the child agent's own model, then whatever
    // the parent run inherited.
    let model = req
        .model
        .clone()
        .or_else(|| child_agent.model.clone())
        .or_else(|| parent_model.map(ToString::to_string));

    let turn_budget = req
        .max_turns
        .map(|t| t.min(MAX_TASK_TURNS))
        .unwrap_or_else(|| AgentRegistry::turn_budget(&req.subagent_type));

    let child_session_id = match &req.resume {
        Some(resume_id) => match orchestrator.sessions().get(resume_id) {
            Ok(Some(_)) => resume_id.clone(),
            Ok(None) => {
                return ToolResult::fail(
                    codes::NOT_FOUND,
                    "Session to resume not found",
                    format!("No session with id '{}'", resume_id),
                )
            }
            Err(e) => {
                return ToolResult::fail(
                    codes::TOOL_ERROR,
                    "Failed to look up session",
                    e.to_string(),
                )
            }
        },
        None => {
            let new = NewSession {
                agent_name: child_agent.name.clone(),
                parent_session_id: Some(parent.id.clone()),
                title: req.description.clone(),
                working_dir: parent.working_dir.clone(),
                user_id: parent.user_id.clone(),
                system_prompt: None,
            };
            match orchestrator.sessions().create(new) {
                Ok(id) => id,
                Err(e) => {
                    return ToolResult::fail(
                        codes::TOOL_ERROR,
                        "Failed to create sub-agent session",
                        e.to_string(),
                    )
                }
            }
        }
    };

    let child_opts = RunOptions {
        agent: Some(child_agent.name.clone()),
        model,
        temperature: None,
        top_p: None,
        max_steps: Some(turn_budget),
        can_execute_code: parent_opts.can_execute_code,
        project_path: parent_opts.project_path.clone(),
        user_id: parent.user_id.clone(),
        // A detached child outlives its parent's cancellation; an inline
        // child is cancelled with it.
        cancel: if req.run_in_background {
            CancellationToken::new()
        } else {
            parent_opts.cancel.child_token()
        },
        event_tx: None,
    };

    emit(
        events,
        LoopEvent::TaskSpawned {
            session_id: child_session_id.clone(),
            background: req.run_in_background,
        },
    );

    if req.run_in_background {
        let orch = orchestrator.clone();
        let session_id = child_session_id.clone();
        let prompt = req.prompt.clone();
        let description = req.description.clone();
        tokio::spawn(async move {
            if let Err(e) = orch.run(&session_id, &prompt, child_opts).await {
                tracing::warn!(
                    session_id = %session_id,
                    task = %description,
                    "Background task failed: {}", e
                );
            }
        });

        return ToolResult::ok_with(
            format!("Task started in background: {}", req.description),
            format!(
                "Sub-agent session {} is running in the background. Check the stored \
                 session and its messages for completion.",
                child_session_id
            ),
            json!({
                "session_id": child_session_id,
                "background": true,
                "subagent_type": req.subagent_type,
            }),
        );
    }

    // Inline: recurse through the same turn loop, boxed to break the cycle.
    let run: Pin<Box<dyn Future<Output = Result<RunOutcome, RunError>> + Send + '_>> =
        Box::pin(orchestrator.run(&child_session_id, &req.prompt, child_opts));

    match run.await {
        Ok(outcome) => ToolResult::ok_with(
            format!("Task complete: {}", req.description),
            outcome.text,
            json!({
                "session_id": child_session_id,
                "turns_used": outcome.steps_used,
                "input_tokens": outcome.usage.input_tokens,
                "output_tokens": outcome.usage.output_tokens,
            }),
        ),
        // A failed child must not take down the parent loop; surface it as
        // a structured tool failure instead.
        Err(e) => ToolResult::fail_with(
            codes::TOOL_ERROR,
            format!("Task failed: {}", req.description),
            e.to_string(),
            json!({ "session_id": child_session_id }),
        ),
    }
    })
}
