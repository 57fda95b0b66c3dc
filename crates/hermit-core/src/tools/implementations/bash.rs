//! Bash tool - Execute shell commands with bounded output
//!
//! Commands run in a non-interactive shell rooted at the project path with a
//! deterministic environment. Stdout and stderr are captured through
//! per-stream capped sinks; past the cap, output is discarded rather than
//! buffered. Timeouts and external cancellation both terminate the process
//! tree gracefully first, forcefully after a grace period.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::tools::registry::{codes, parse_params, ExecutionContext, Tool, ToolResult};
use crate::tools::truncation::CappedSink;

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const MAX_TIMEOUT_SECS: u64 = 600;
/// Per-stream capture limit (stdout and stderr each).
const MAX_OUTPUT_CHARS: usize = 30_000;
/// Grace period between SIGTERM and SIGKILL.
const KILL_GRACE: Duration = Duration::from_secs(5);
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct BashTool;

#[derive(Deserialize)]
struct Params {
    command: String,
    #[serde(default)]
    timeout: Option<u64>,
}

fn build_shell_command(command: &str, ctx: &ExecutionContext) -> Command {
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };

    // Deterministic, non-interactive environment.
    cmd.env("NO_COLOR", "1");
    cmd.env("TERM", "dumb");
    cmd.current_dir(&ctx.project_path);
    cmd
}

async fn collect_pipe<R>(pipe: Option<R>, sink: Arc<Mutex<CappedSink>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(pipe) = pipe else {
        return;
    };

    let mut reader = BufReader::new(pipe).lines();
    while let Ok(Some(line)) = reader.next_line().await {
        sink.lock().await.push_line(&line);
    }
}

async fn join_reader(mut handle: tokio::task::JoinHandle<()>) {
    if timeout(READER_JOIN_TIMEOUT, &mut handle).await.is_err() {
        handle.abort();
    }
    let _ = handle.await;
}

#[cfg(unix)]
fn signal_process_group(pid: u32, signal: &str) {
    // Signal the whole group first; fall back to the direct pid.
    let group = format!("-{}", pid);
    let group_ok = std::process::Command::new("kill")
        .arg(signal)
        .arg(&group)
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    if !group_ok {
        let _ = std::process::Command::new("kill")
            .arg(signal)
            .arg(pid.to_string())
            .status();
    }
}

/// TERM, wait out the grace period, then KILL anything still running.
async fn terminate_process_tree(child: &mut Child) {
    let Some(pid) = child.id() else {
        let _ = child.kill().await;
        return;
    };

    #[cfg(unix)]
    signal_process_group(pid, "-TERM");
    #[cfg(not(unix))]
    let _ = pid;

    if timeout(KILL_GRACE, child.wait()).await.is_err() {
        #[cfg(unix)]
        signal_process_group(pid, "-KILL");
        let _ = child.kill().await;
        let _ = child.wait().await;
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the project directory. Use for builds, git, and system utilities; \
         prefer the read/write/edit/glob/grep tools for file operations."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to execute"
                },
                "timeout": {
                    "type": "number",
                    "description": "Timeout in seconds (default 120, max 600)"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        tracing::info!(command = %params.command, "Executing bash command");

        let timeout_secs = params
            .timeout
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .min(MAX_TIMEOUT_SECS);
        let deadline = Duration::from_secs(timeout_secs);

        let mut cmd = build_shell_command(&params.command, ctx);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd.kill_on_drop(true);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                return ToolResult::fail(
                    codes::COMMAND_FAILED,
                    "Failed to spawn command",
                    format!("{}", e),
                )
            }
        };

        if let Some(pid) = child.id() {
            ctx.update_metadata(json!({ "pid": pid }));
        }

        let stdout_sink = Arc::new(Mutex::new(CappedSink::new(MAX_OUTPUT_CHARS)));
        let stderr_sink = Arc::new(Mutex::new(CappedSink::new(MAX_OUTPUT_CHARS)));

        let stdout_handle = tokio::spawn(collect_pipe(child.stdout.take(), stdout_sink.clone()));
        let stderr_handle = tokio::spawn(collect_pipe(child.stderr.take(), stderr_sink.clone()));

        let (exit_code, timed_out, cancelled) = tokio::select! {
            status = child.wait() => {
                let code = match status {
                    Ok(s) => s.code().unwrap_or(-1),
                    Err(e) => {
                        tracing::error!("Process wait error: {}", e);
                        -1
                    }
                };
                (code, false, false)
            }
            _ = tokio::time::sleep(deadline) => {
                terminate_process_tree(&mut child).await;
                (-1, true, false)
            }
            _ = ctx.cancel.cancelled() => {
                terminate_process_tree(&mut child).await;
                (-1, true, true)
            }
        };

        join_reader(stdout_handle).await;
        join_reader(stderr_handle).await;

        let stdout_text = {
            let mut guard = stdout_sink.lock().await;
            std::mem::replace(&mut *guard, CappedSink::new(0)).into_text()
        };
        let stderr_text = {
            let mut guard = stderr_sink.lock().await;
            std::mem::replace(&mut *guard, CappedSink::new(0)).into_text()
        };

        let mut combined = stdout_text;
        if !stderr_text.trim().is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str("--- stderr ---\n");
            combined.push_str(&stderr_text);
        }

        let metadata = json!({
            "exit_code": exit_code,
            "timed_out": timed_out,
            "cancelled": cancelled,
        });

        if timed_out {
            let reason = if cancelled {
                "Command cancelled".to_string()
            } else {
                format!("Command timed out after {} seconds", timeout_secs)
            };
            ToolResult::fail_with(codes::TIMEOUT, reason, combined, metadata)
        } else if exit_code == 0 {
            ToolResult::ok_with("Command succeeded", combined, metadata)
        } else {
            ToolResult::fail_with(
                codes::COMMAND_FAILED,
                format!("Command exited with code {}", exit_code),
                combined,
                metadata,
            )
        }
    }
}
