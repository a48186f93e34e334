//! Foreground command execution
//!
//! Runs `shell -c <command>` inside a session's working directory and waits
//! for completion within the HTTP request lifetime. The child environment is
//! the host environment overlaid with session variables and then per-call
//! variables; per-call additions never persist into the session.

use crate::error::{Error, Result};
use crate::history::HistoryLog;
use crate::process::kill_process_group;
use crate::session::SessionRegistry;
use crate::shell::ShellResolver;
use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{info, warn};
use uuid::Uuid;

/// Request body for command execution and background process start.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    /// Shell command line
    pub command: String,
    /// Timeout in seconds; 0 or absent means no timeout
    #[serde(default)]
    pub timeout: u64,
    /// Per-call environment overlay
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

/// Request body for sequential batch execution.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCommandRequest {
    pub commands: Vec<String>,
    #[serde(default)]
    pub continue_on_error: bool,
    /// Per-command timeout in seconds
    #[serde(default)]
    pub timeout: u64,
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

/// Result of one foreground command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock duration in seconds
    pub execution_time: f64,
    pub command: String,
}

/// Synchronous (request-scoped) command executor.
pub struct CommandExecutor {
    registry: Arc<SessionRegistry>,
    history: Arc<HistoryLog>,
    shells: Arc<ShellResolver>,
}

impl CommandExecutor {
    pub fn new(
        registry: Arc<SessionRegistry>,
        history: Arc<HistoryLog>,
        shells: Arc<ShellResolver>,
    ) -> Self {
        Self {
            registry,
            history,
            shells,
        }
    }

    /// Execute one command and wait for it.
    ///
    /// Spawn failures and signal deaths are reported inside the result as
    /// `exit_code = -1` with the message appended to stderr; only session
    /// and precondition problems surface as errors.
    pub async fn execute(&self, session_id: Uuid, request: &CommandRequest) -> Result<CommandOutput> {
        let session = self.registry.get(session_id).await?;
        let working_dir = session.require_working_dir().await?;

        self.history.append(session_id, &request.command).await;

        let session_env = session.env_vars().await;
        let shell = self.shells.resolve(session_env.get("SHELL").map(String::as_str));

        let mut cmd = Command::new(&shell);
        cmd.arg("-c")
            .arg(&request.command)
            .current_dir(&working_dir)
            .envs(&session_env)
            .envs(&request.environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        cmd.process_group(0);

        let started = Instant::now();

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(session = %session_id, command = %request.command, error = %e, "failed to spawn command");
                return Ok(CommandOutput {
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: e.to_string(),
                    execution_time: started.elapsed().as_secs_f64(),
                    command: request.command.clone(),
                });
            }
        };

        let pid = child.id();
        let mut stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("stdout pipe was not available".into()))?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("stderr pipe was not available".into()))?;

        // Drain both pipes concurrently so a chatty child cannot deadlock
        // against a full kernel buffer while we wait on it.
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stdout_pipe.read_to_end(&mut buf).await;
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr_pipe.read_to_end(&mut buf).await;
            buf
        });

        let mut wait_error: Option<String> = None;
        let status = if request.timeout > 0 {
            match tokio::time::timeout(Duration::from_secs(request.timeout), child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!(session = %session_id, command = %request.command, timeout = request.timeout, "command timed out, killing");
                    if let Some(pid) = pid {
                        kill_process_group(pid, Signal::SIGKILL);
                    }
                    child.wait().await
                }
            }
        } else {
            child.wait().await
        };

        let exit_code = match status {
            Ok(status) => status.code().unwrap_or(-1),
            Err(e) => {
                wait_error = Some(e.to_string());
                -1
            }
        };

        let stdout = String::from_utf8_lossy(&stdout_task.await.unwrap_or_default()).into_owned();
        let mut stderr = String::from_utf8_lossy(&stderr_task.await.unwrap_or_default()).into_owned();
        if let Some(message) = wait_error {
            if !stderr.is_empty() && !stderr.ends_with('\n') {
                stderr.push('\n');
            }
            stderr.push_str(&message);
        }

        let output = CommandOutput {
            exit_code,
            stdout,
            stderr,
            execution_time: started.elapsed().as_secs_f64(),
            command: request.command.clone(),
        };

        self.registry
            .log_activity(
                session_id,
                &format!(
                    "Executed command: {} (exit code: {})",
                    request.command, output.exit_code
                ),
            )
            .await;
        info!(session = %session_id, command = %request.command, exit_code = output.exit_code, "command completed");

        Ok(output)
    }

    /// Execute a list of commands sequentially.
    ///
    /// Without `continue_on_error`, the batch stops after the first command
    /// that fails to run or exits non-zero; the results produced so far
    /// (including the failing one) are returned.
    pub async fn execute_batch(
        &self,
        session_id: Uuid,
        request: &BatchCommandRequest,
    ) -> Result<Vec<CommandOutput>> {
        let session = self.registry.get(session_id).await?;
        session.require_working_dir().await?;

        let mut results = Vec::with_capacity(request.commands.len());
        for command in &request.commands {
            let cmd_request = CommandRequest {
                command: command.clone(),
                timeout: request.timeout,
                environment: request.environment.clone(),
            };

            match self.execute(session_id, &cmd_request).await {
                Ok(output) => {
                    let failed = output.exit_code != 0;
                    results.push(output);
                    if failed && !request.continue_on_error {
                        break;
                    }
                }
                Err(e) => {
                    if !request.continue_on_error {
                        return Err(e);
                    }
                }
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests;
