//! The turn loop
//!
//! `Orchestrator` owns the canonical agentic loop: resolve the session and
//! agent, assemble the permitted tool set, persist the user turn, stream a
//! completion, execute tool calls (intercepting `task` to spawn sub-agent
//! sessions), and fold everything back into persisted conversation state.
//!
//! Expected tool failures stay inside the loop as structured results; only
//! resolution failures and provider failures surface as `RunError`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agents::AgentRegistry;
use crate::ai::client::{CallOptions, CompletionClient};
use crate::ai::types::{Content, FinishReason, ModelMessage, Role, Usage};
use crate::storage::{Database, MessageStore, SessionStatus, SessionStore};
use crate::tools::registry::{ExecutionContext, ToolProgress, ToolRegistry};

use super::executor;
use super::failure;
use super::loop_events::{emit, EventSink, LoopEvent};
use super::spawn;
use super::stream;

const DEFAULT_MAX_STEPS: usize = 25;

/// Shared services the orchestrator needs.
pub struct OrchestratorServices {
    pub client: Arc<dyn CompletionClient>,
    pub tools: Arc<ToolRegistry>,
    pub db: Database,
}

/// Per-run options. Caller-supplied values override agent defaults.
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Agent override; defaults to the session's stored agent.
    pub agent: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    /// Turn budget override; defaults to the agent's, then 25.
    pub max_steps: Option<usize>,
    /// Capability gate for tools that execute code (bash).
    pub can_execute_code: bool,
    /// Project root; defaults to the session's working directory.
    pub project_path: Option<PathBuf>,
    pub user_id: Option<String>,
    pub cancel: CancellationToken,
    pub event_tx: EventSink,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub session_id: String,
    /// Final assistant text.
    pub text: String,
    pub steps_used: usize,
    pub usage: Usage,
    pub finish_reason: FinishReason,
}

/// Failures that abort a run. Everything else is recovered into the
/// conversation as a structured tool result.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("agent not found: {0}")]
    AgentNotFound(String),
    #[error("completion provider failure: {0}")]
    Provider(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// The agent orchestrator. Cheap to clone; clones share the same services.
#[derive(Clone)]
pub struct Orchestrator {
    client: Arc<dyn CompletionClient>,
    tools: Arc<ToolRegistry>,
    db: Database,
    sessions: SessionStore,
    messages: MessageStore,
}

impl Orchestrator {
    pub fn new(services: OrchestratorServices) -> Self {
        let sessions = SessionStore::new(services.db.clone());
        let messages = MessageStore::new(services.db.clone());
        Self {
            client: services.client,
            tools: services.tools,
            db: services.db,
            sessions,
            messages,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    /// Run one user turn against a session until the model stops, the turn
    /// budget is exhausted, or an unrecoverable failure occurs.
    pub async fn run(
        &self,
        session_id: &str,
        user_input: &str,
        opts: RunOptions,
    ) -> Result<RunOutcome, RunError> {
        // ── Resolve ────────────────────────────────────────────────────
        let session = self
            .sessions
            .get(session_id)?
            .ok_or_else(|| RunError::SessionNotFound(session_id.to_string()))?;

        let agent_name = opts
            .agent
            .clone()
            .unwrap_or_else(|| session.agent_name.clone());

        let project_path = opts
            .project_path
            .clone()
            .or_else(|| session.working_dir.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let project_path = project_path
            .canonicalize()
            .map_err(|e| RunError::Storage(anyhow::anyhow!("invalid project path: {}", e)))?;
        let project_str = project_path.to_string_lossy().to_string();

        let agent = AgentRegistry::get(Some(&self.db), &agent_name, Some(&project_str))
            .ok_or_else(|| RunError::AgentNotFound(agent_name.clone()))?;

        // ── Assemble tools ─────────────────────────────────────────────
        let available = self.tools.names().await;
        let allowed = AgentRegistry::resolve_tools(&agent, Some(&available));

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ToolProgress>();
        let progress_events = opts.event_tx.clone();
        tokio::spawn(async move {
            while let Some(p) = progress_rx.recv().await {
                emit(
                    &progress_events,
                    LoopEvent::ToolProgress {
                        id: p.tool_call_id,
                        metadata: p.metadata,
                    },
                );
            }
        });

        let mut ctx = ExecutionContext::new(project_path.clone())
            .with_session_id(session_id)
            .with_db(self.db.clone())
            .with_cancel(opts.cancel.clone())
            .with_progress(progress_tx, session_id);
        if let Some(user_id) = opts.user_id.clone().or_else(|| session.user_id.clone()) {
            ctx = ctx.with_user_id(user_id);
        }

        let toolset = self
            .tools
            .export_callable(ctx, Some(&allowed), opts.can_execute_code)
            .await;

        // ── Persist the user turn before the first provider call ───────
        self.messages.append(
            session_id,
            Role::User,
            &[Content::Text {
                text: user_input.to_string(),
            }],
        )?;
        if session.title.is_empty() {
            warn_on_err(
                self.sessions
                    .set_title_if_empty(session_id, &SessionStore::derive_title(user_input)),
                "set session title",
            );
        }
        warn_on_err(
            self.sessions.set_status(session_id, SessionStatus::Running),
            "set session status",
        );

        let mut conversation = self.messages.load_conversation(session_id)?;

        let effective_model = opts.model.clone().or_else(|| agent.model.clone());
        let call_options = CallOptions {
            model: effective_model.clone(),
            system: session
                .system_prompt
                .clone()
                .or_else(|| agent.system_prompt.clone()),
            temperature: opts.temperature.or(agent.temperature),
            top_p: opts.top_p.or(agent.top_p),
            tools: toolset.definitions(),
        };

        let max_steps = opts.max_steps.or(agent.max_steps).unwrap_or(DEFAULT_MAX_STEPS);
        let events = opts.event_tx.clone();

        let mut total_usage = Usage::default();
        let mut final_text = String::new();
        let mut steps_used = 0usize;
        let mut finish_reason = FinishReason::Stop;
        let mut failure_signatures: HashMap<String, usize> = HashMap::new();

        // ── Turn loop ──────────────────────────────────────────────────
        for step in 1..=max_steps {
            steps_used = step;

            let rx = match self.client.stream(conversation.clone(), &call_options).await {
                Ok(rx) => rx,
                Err(e) => {
                    return self.provider_failure(
                        session_id,
                        String::new(),
                        &total_usage,
                        &e.to_string(),
                        &events,
                    )
                }
            };

            let result = stream::process_stream(rx, &events).await;
            total_usage.add(&result.usage);

            if let Some(error) = result.provider_error {
                return self.provider_failure(
                    session_id,
                    result.text,
                    &total_usage,
                    &error,
                    &events,
                );
            }

            if !result.text.is_empty() {
                final_text = result.text.clone();
            }

            // Persist the assistant step (text + tool_use blocks).
            let mut assistant_content =
                Vec::with_capacity(result.tool_calls.len() + usize::from(!result.text.is_empty()));
            if !result.text.is_empty() {
                assistant_content.push(Content::Text {
                    text: result.text.clone(),
                });
            }
            for call in &result.tool_calls {
                assistant_content.push(Content::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.clone(),
                });
            }
            if !assistant_content.is_empty() {
                conversation.push(ModelMessage {
                    role: Role::Assistant,
                    content: assistant_content.clone(),
                });
                warn_on_err(
                    self.messages
                        .append_assistant(session_id, &assistant_content, result.usage)
                        .map(|_| ()),
                    "save assistant message",
                );
            }

            if result.tool_calls.is_empty() {
                finish_reason = result.finish_reason;
                emit(
                    &events,
                    LoopEvent::TurnComplete {
                        turn: step,
                        has_more: false,
                    },
                );
                break;
            }

            // Execute tool calls in request order. `task` belongs to the
            // orchestrator, never to the tool's own body.
            let mut results_content = Vec::with_capacity(result.tool_calls.len());
            for call in &result.tool_calls {
                let content = if call.name == "task" && toolset.contains("task") {
                    let task_result = spawn::execute_task_call(
                        self,
                        &session,
                        &opts,
                        effective_model.as_deref(),
                        call,
                        &events,
                    )
                    .await;
                    executor::finalize(call, task_result, &events)
                } else {
                    executor::execute_tool_call(call, &toolset, &events).await
                };
                results_content.push(content);
            }

            let diagnostic = failure::detect_repeated_failures(
                &mut failure_signatures,
                &result.tool_calls,
                &results_content,
            );

            conversation.push(ModelMessage {
                role: Role::User,
                content: results_content.clone(),
            });
            warn_on_err(
                self.messages
                    .append(session_id, Role::User, &results_content)
                    .map(|_| ()),
                "save tool results",
            );

            if let Some(diagnostic) = diagnostic {
                tracing::warn!(
                    session_id = %session_id,
                    step,
                    "Fail-fast: {}", diagnostic
                );
                emit(&events, LoopEvent::Error { error: diagnostic });
                finish_reason = FinishReason::Other;
                emit(
                    &events,
                    LoopEvent::TurnComplete {
                        turn: step,
                        has_more: false,
                    },
                );
                break;
            }

            if step == max_steps {
                finish_reason = FinishReason::Length;
            } else {
                emit(
                    &events,
                    LoopEvent::TurnComplete {
                        turn: step,
                        has_more: true,
                    },
                );
            }
        }

        // ── Finish ─────────────────────────────────────────────────────
        warn_on_err(
            self.sessions.record_usage(session_id, &total_usage),
            "record session usage",
        );
        warn_on_err(
            self.sessions.set_status(session_id, SessionStatus::Complete),
            "set session status",
        );
        emit(
            &events,
            LoopEvent::Finished {
                session_id: session_id.to_string(),
            },
        );

        Ok(RunOutcome {
            session_id: session_id.to_string(),
            text: final_text,
            steps_used,
            usage: total_usage,
            finish_reason,
        })
    }

    /// Provider failure: persist the partial assistant message with its
    /// error classification, mark the session, and re-throw. This is the one
    /// failure class allowed to abort the run - there is no meaningful
    /// partial result to fold back.
    fn provider_failure(
        &self,
        session_id: &str,
        partial_text: String,
        usage: &Usage,
        error: &str,
        events: &EventSink,
    ) -> Result<RunOutcome, RunError> {
        let content = if partial_text.is_empty() {
            Vec::new()
        } else {
            vec![Content::Text { text: partial_text }]
        };
        warn_on_err(
            self.messages
                .append_errored(session_id, &content, "provider_failure", error)
                .map(|_| ()),
            "save errored assistant message",
        );
        warn_on_err(
            self.sessions.record_usage(session_id, usage),
            "record session usage",
        );
        warn_on_err(
            self.sessions.set_status(session_id, SessionStatus::Error),
            "set session status",
        );
        emit(
            events,
            LoopEvent::Error {
                error: error.to_string(),
            },
        );
        Err(RunError::Provider(error.to_string()))
    }
}

fn warn_on_err(result: anyhow::Result<()>, what: &str) {
    if let Err(e) = result {
        tracing::warn!("Failed to {}: {}", what, e);
    }
}
