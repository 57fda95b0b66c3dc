//! Orchestrator integration tests
//!
//! Drives the full turn loop against a scripted in-memory completion client:
//! tool execution, sub-agent spawning, provider failure, and budget
//! exhaustion, all against a real temp project directory and an in-memory
//! database.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};

use hermit_core::agents::AgentRegistry;
use hermit_core::ai::types::{AiToolCall, FinishReason, ModelMessage, Usage};
use hermit_core::ai::{CallOptions, CompletionClient, StreamPart};
use hermit_core::storage::{Database, NewSession, SessionStatus, SessionStore};
use hermit_core::tools::{register_all_tools, ExecutionContext, ToolRegistry};
use hermit_core::{Orchestrator, OrchestratorServices, RunError, RunOptions};

/// Completion client that replays scripted turns in order.
struct ScriptedClient {
    turns: Mutex<VecDeque<Vec<StreamPart>>>,
}

impl ScriptedClient {
    fn new(turns: Vec<Vec<StreamPart>>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
        })
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn stream(
        &self,
        _messages: Vec<ModelMessage>,
        _options: &CallOptions,
    ) -> anyhow::Result<mpsc::UnboundedReceiver<StreamPart>> {
        let parts = self.turns.lock().await.pop_front().unwrap_or_else(|| {
            vec![
                StreamPart::TextDelta {
                    delta: "(script exhausted)".to_string(),
                },
                StreamPart::Finish {
                    reason: FinishReason::Stop,
                },
            ]
        });

        let (tx, rx) = mpsc::unbounded_channel();
        for part in parts {
            let _ = tx.send(part);
        }
        Ok(rx)
    }
}

fn text_turn(text: &str) -> Vec<StreamPart> {
    vec![
        StreamPart::TextDelta {
            delta: text.to_string(),
        },
        StreamPart::Usage {
            usage: Usage {
                input_tokens: 10,
                output_tokens: 5,
                cost_usd: None,
            },
        },
        StreamPart::Finish {
            reason: FinishReason::Stop,
        },
    ]
}

fn tool_turn(id: &str, name: &str, arguments: serde_json::Value) -> Vec<StreamPart> {
    vec![
        StreamPart::ToolCallComplete {
            tool_call: AiToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments,
            },
        },
        StreamPart::Usage {
            usage: Usage {
                input_tokens: 20,
                output_tokens: 8,
                cost_usd: None,
            },
        },
        StreamPart::Finish {
            reason: FinishReason::ToolCalls,
        },
    ]
}

struct Harness {
    orchestrator: Orchestrator,
    sessions: SessionStore,
    project: tempfile::TempDir,
}

async fn harness(turns: Vec<Vec<StreamPart>>) -> Harness {
    let db = Database::open_in_memory().unwrap();
    let tools = Arc::new(ToolRegistry::new());
    register_all_tools(&tools).await;

    let orchestrator = Orchestrator::new(OrchestratorServices {
        client: ScriptedClient::new(turns),
        tools,
        db: db.clone(),
    });

    Harness {
        orchestrator,
        sessions: SessionStore::new(db),
        project: tempfile::tempdir().unwrap(),
    }
}

impl Harness {
    fn new_session(&self, agent: &str) -> String {
        self.sessions
            .create(NewSession {
                agent_name: agent.to_string(),
                working_dir: Some(self.project.path().to_string_lossy().to_string()),
                ..Default::default()
            })
            .unwrap()
    }

    fn opts(&self) -> RunOptions {
        RunOptions {
            can_execute_code: true,
            ..Default::default()
        }
    }
}

#[tokio::test]
async fn plain_text_run_persists_and_finishes() {
    let h = harness(vec![text_turn("Hello there")]).await;
    let session_id = h.new_session("default");

    let outcome = h
        .orchestrator
        .run(&session_id, "say hello", h.opts())
        .await
        .unwrap();

    assert_eq!(outcome.text, "Hello there");
    assert_eq!(outcome.steps_used, 1);
    assert_eq!(outcome.finish_reason, FinishReason::Stop);
    assert_eq!(outcome.usage.input_tokens, 10);

    let session = h.sessions.get(&session_id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Complete);
    assert_eq!(session.message_count, 2); // user + assistant
    assert_eq!(session.input_tokens, 10);
    assert_eq!(session.title, "say hello");
}

#[tokio::test]
async fn tool_call_result_feeds_back_into_loop() {
    let h = harness(vec![
        tool_turn("c1", "read", json!({"path": "notes.txt"})),
        text_turn("The file says: hello from notes"),
    ])
    .await;
    std::fs::write(h.project.path().join("notes.txt"), "hello from notes\n").unwrap();
    let session_id = h.new_session("default");

    let outcome = h
        .orchestrator
        .run(&session_id, "what does notes.txt say?", h.opts())
        .await
        .unwrap();

    assert_eq!(outcome.steps_used, 2);
    assert_eq!(outcome.text, "The file says: hello from notes");

    // user, assistant(tool_use), user(tool_result), assistant(text)
    let messages = h.orchestrator.messages().list_by_session(&session_id).unwrap();
    assert_eq!(messages.len(), 4);
    assert!(messages[2].content.contains("hello from notes"));
}

#[tokio::test]
async fn failing_tool_call_does_not_abort_the_run() {
    let h = harness(vec![
        tool_turn("c1", "no_such_tool", json!({})),
        text_turn("recovered"),
    ])
    .await;
    let session_id = h.new_session("default");

    let outcome = h
        .orchestrator
        .run(&session_id, "try something", h.opts())
        .await
        .unwrap();

    assert_eq!(outcome.text, "recovered");
    let messages = h.orchestrator.messages().list_by_session(&session_id).unwrap();
    assert!(messages[2].content.contains("unknown_tool"));
}

#[tokio::test]
async fn subagent_spawn_creates_linked_child_session() {
    let h = harness(vec![
        tool_turn(
            "c1",
            "task",
            json!({
                "description": "find X",
                "prompt": "find X in the codebase",
                "subagent_type": "explore"
            }),
        ),
        text_turn("child says: found it"),
        text_turn("Summary: found it"),
    ])
    .await;
    let session_id = h.new_session("default");

    let outcome = h
        .orchestrator
        .run(&session_id, "delegate this", h.opts())
        .await
        .unwrap();
    assert_eq!(outcome.text, "Summary: found it");

    // Exactly one child, linked to the parent and running the explore agent.
    let all = h.sessions.list(None).unwrap();
    let children: Vec<_> = all
        .iter()
        .filter(|s| s.parent_session_id.as_deref() == Some(session_id.as_str()))
        .collect();
    assert_eq!(children.len(), 1);
    let child = children[0];
    assert_eq!(child.agent_name, "explore");
    assert_eq!(child.status, SessionStatus::Complete);

    // The child's answer is folded back into the parent conversation.
    let messages = h.orchestrator.messages().list_by_session(&session_id).unwrap();
    assert!(messages[2].content.contains("child says: found it"));
}

#[tokio::test]
async fn explore_subagent_tool_set_excludes_write_edit_bash() {
    let tools = Arc::new(ToolRegistry::new());
    register_all_tools(&tools).await;

    let explore = AgentRegistry::get(None, "explore", None).unwrap();
    let available = tools.names().await;
    let allowed = AgentRegistry::resolve_tools(&explore, Some(&available));

    let ctx = ExecutionContext::new(std::env::temp_dir());
    let set = tools.export_callable(ctx, Some(&allowed), true).await;

    for forbidden in ["write", "edit", "bash"] {
        assert!(!set.contains(forbidden), "{} must be excluded", forbidden);
    }
    for expected in ["read", "glob", "grep", "list"] {
        assert!(set.contains(expected), "{} must be included", expected);
    }
    assert_eq!(AgentRegistry::turn_budget("explore"), 15);
}

#[tokio::test]
async fn background_task_returns_session_id_immediately() {
    let h = harness(vec![
        tool_turn(
            "c1",
            "task",
            json!({
                "description": "long job",
                "prompt": "do the long job",
                "subagent_type": "default",
                "run_in_background": true
            }),
        ),
        // One of these feeds the parent's second step, the other the child.
        text_turn("done"),
        text_turn("done"),
    ])
    .await;
    let session_id = h.new_session("default");

    let outcome = h
        .orchestrator
        .run(&session_id, "kick off the job", h.opts())
        .await
        .unwrap();
    assert_eq!(outcome.text, "done");

    // The tool result carried the child session id without waiting.
    let messages = h.orchestrator.messages().list_by_session(&session_id).unwrap();
    assert!(messages[2].content.contains("background"));

    let child_id = {
        let all = h.sessions.list(None).unwrap();
        all.iter()
            .find(|s| s.parent_session_id.as_deref() == Some(session_id.as_str()))
            .map(|s| s.id.clone())
            .expect("child session should exist")
    };

    // Completion is observable through persisted state only.
    for _ in 0..50 {
        let status = h.sessions.get(&child_id).unwrap().unwrap().status;
        if status == SessionStatus::Complete {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    panic!("background child session never completed");
}

#[tokio::test]
async fn provider_failure_marks_message_and_rethrows() {
    let h = harness(vec![vec![
        StreamPart::TextDelta {
            delta: "partial answer".to_string(),
        },
        StreamPart::Error {
            error: "upstream 529".to_string(),
        },
    ]])
    .await;
    let session_id = h.new_session("default");

    let err = h
        .orchestrator
        .run(&session_id, "please answer", h.opts())
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::Provider(_)));

    let session = h.sessions.get(&session_id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Error);

    let messages = h.orchestrator.messages().list_by_session(&session_id).unwrap();
    // The user turn was persisted before the model call...
    assert_eq!(messages[0].role, "user");
    // ...and the in-flight assistant message is marked errored.
    let errored = messages.last().unwrap();
    assert_eq!(errored.error_type.as_deref(), Some("provider_failure"));
    assert_eq!(errored.error_message.as_deref(), Some("upstream 529"));
    assert!(errored.content.contains("partial answer"));
}

#[tokio::test]
async fn missing_session_and_agent_are_typed_errors() {
    let h = harness(vec![]).await;

    let err = h
        .orchestrator
        .run("no-such-session", "hi", h.opts())
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::SessionNotFound(_)));

    let session_id = h.new_session("nonexistent-agent");
    let err = h
        .orchestrator
        .run(&session_id, "hi", h.opts())
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::AgentNotFound(_)));
}

#[tokio::test]
async fn turn_budget_exhaustion_stops_the_loop() {
    // The model asks for a (successful) tool call every turn, with varying
    // arguments so the fail-fast never trips.
    let h = harness(vec![
        tool_turn("c1", "list", json!({"depth": 0})),
        tool_turn("c2", "list", json!({"depth": 1})),
        tool_turn("c3", "list", json!({"depth": 2})),
    ])
    .await;
    let session_id = h.new_session("default");

    let mut opts = h.opts();
    opts.max_steps = Some(2);
    let outcome = h
        .orchestrator
        .run(&session_id, "keep going", opts)
        .await
        .unwrap();

    assert_eq!(outcome.steps_used, 2);
    assert_eq!(outcome.finish_reason, FinishReason::Length);
}

#[tokio::test]
async fn repeated_identical_failures_fail_fast() {
    let read_missing = json!({"path": "missing.txt"});
    let h = harness(vec![
        tool_turn("c1", "read", read_missing.clone()),
        tool_turn("c2", "read", read_missing.clone()),
        text_turn("should never be reached"),
    ])
    .await;
    let session_id = h.new_session("default");

    let outcome = h
        .orchestrator
        .run(&session_id, "read that file", h.opts())
        .await
        .unwrap();

    assert_eq!(outcome.steps_used, 2);
    assert_eq!(outcome.finish_reason, FinishReason::Other);
    assert_ne!(outcome.text, "should never be reached");
}

#[tokio::test]
async fn run_without_code_execution_capability_still_works() {
    let h = harness(vec![text_turn("ok")]).await;
    let session_id = h.new_session("explore");

    let mut opts = h.opts();
    opts.can_execute_code = false;
    let outcome = h
        .orchestrator
        .run(&session_id, "explore something", opts)
        .await
        .unwrap();
    assert_eq!(outcome.text, "ok");
}
