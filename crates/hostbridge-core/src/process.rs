//! Background process supervision
//!
//! A background process is spawned with stdin, stdout, and stderr piped and
//! lives past the request that created it. Two collector tasks copy the
//! output streams into a bounded line buffer, and a reaper task records the
//! exit code, drains stragglers, and closes the real-time taps.
//!
//! Each child leads its own process group; signals (including the timeout
//! SIGKILL) are delivered to the group so shell pipelines die with the
//! shell.

use crate::error::{Error, Result};
use crate::exec::CommandRequest;
use crate::history::HistoryLog;
use crate::session::SessionRegistry;
use crate::shell::ShellResolver;
use chrono::{DateTime, Utc};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

/// Per-stream line cap; older lines are evicted FIFO.
pub const MAX_BUFFER_LINES: usize = 10_000;

/// Capacity of the real-time fan-out channels.
const TAP_CAPACITY: usize = 100;

/// Grace given to the collectors between child exit and tap close.
const DRAIN_DELAY: Duration = Duration::from_millis(100);

/// Send `signal` to the process group led by `pid`. Best-effort: a process
/// that is already gone is not an error worth surfacing here.
pub fn kill_process_group(pid: u32, signal: Signal) {
    let _ = kill(Pid::from_raw(-(pid as i32)), signal);
}

#[derive(Default)]
struct LineRings {
    stdout: VecDeque<String>,
    stderr: VecDeque<String>,
}

struct Taps {
    stdout_tx: Option<mpsc::Sender<String>>,
    stderr_tx: Option<mpsc::Sender<String>>,
    stdout_rx: Option<mpsc::Receiver<String>>,
    stderr_rx: Option<mpsc::Receiver<String>>,
}

/// Captured output of one background process: two bounded line rings plus
/// optional real-time taps.
///
/// The rings are guarded by one mutex with no I/O inside the critical
/// section. The taps are offered lines non-blockingly; a full or closed tap
/// drops the line rather than stalling a collector.
pub struct OutputBuffer {
    max_lines: usize,
    lines: StdMutex<LineRings>,
    taps: StdMutex<Taps>,
}

impl OutputBuffer {
    pub fn new(max_lines: usize) -> Self {
        let (stdout_tx, stdout_rx) = mpsc::channel(TAP_CAPACITY);
        let (stderr_tx, stderr_rx) = mpsc::channel(TAP_CAPACITY);
        Self {
            max_lines,
            lines: StdMutex::new(LineRings::default()),
            taps: StdMutex::new(Taps {
                stdout_tx: Some(stdout_tx),
                stderr_tx: Some(stderr_tx),
                stdout_rx: Some(stdout_rx),
                stderr_rx: Some(stderr_rx),
            }),
        }
    }

    pub fn push_stdout(&self, line: String) {
        self.push(line, false);
    }

    pub fn push_stderr(&self, line: String) {
        self.push(line, true);
    }

    fn push(&self, line: String, is_stderr: bool) {
        if let Ok(mut rings) = self.lines.lock() {
            let ring = if is_stderr {
                &mut rings.stderr
            } else {
                &mut rings.stdout
            };
            ring.push_back(line.clone());
            while ring.len() > self.max_lines {
                ring.pop_front();
            }
        }

        let tx = self.taps.lock().ok().and_then(|taps| {
            if is_stderr {
                taps.stderr_tx.clone()
            } else {
                taps.stdout_tx.clone()
            }
        });
        if let Some(tx) = tx {
            // Non-blocking offer; subscribers that fall behind lose lines.
            let _ = tx.try_send(line);
        }
    }

    /// Deep copy of both rings, independent of ongoing writes.
    pub fn snapshot(&self) -> (Vec<String>, Vec<String>) {
        match self.lines.lock() {
            Ok(rings) => (
                rings.stdout.iter().cloned().collect(),
                rings.stderr.iter().cloned().collect(),
            ),
            Err(_) => (Vec::new(), Vec::new()),
        }
    }

    /// Take the real-time stdout tap. Yields `None` after the first call or
    /// once the buffer is closed.
    pub fn take_stdout_tap(&self) -> Option<mpsc::Receiver<String>> {
        self.taps.lock().ok().and_then(|mut taps| taps.stdout_rx.take())
    }

    /// Take the real-time stderr tap.
    pub fn take_stderr_tap(&self) -> Option<mpsc::Receiver<String>> {
        self.taps.lock().ok().and_then(|mut taps| taps.stderr_rx.take())
    }

    /// Close both taps; subsequent pushes still land in the rings.
    fn close_taps(&self) {
        if let Ok(mut taps) = self.taps.lock() {
            taps.stdout_tx.take();
            taps.stderr_tx.take();
        }
    }
}

/// Serializable snapshot of a background process.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub id: Uuid,
    pub command: String,
    pub start_time: DateTime<Utc>,
    pub is_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub pid: u32,
}

/// Live handle to one background process.
///
/// The child itself lives inside the reaper task; everything the API needs
/// afterwards (pid, stdin sink, buffer, completion flag) lives here. None of
/// these fields serialize — the wire shape is [`ProcessInfo`].
pub struct ProcessHandle {
    pub id: Uuid,
    pub command: String,
    pub start_time: DateTime<Utc>,
    pub pid: u32,
    completed: AtomicBool,
    exit_code: AtomicI32,
    stdin: Mutex<Option<ChildStdin>>,
    output: Arc<OutputBuffer>,
    done_rx: watch::Receiver<bool>,
}

impl ProcessHandle {
    pub fn is_running(&self) -> bool {
        // Acquire pairs with the reaper's release store, so a caller that
        // observes completion also observes the exit code.
        !self.completed.load(Ordering::Acquire)
    }

    pub fn exit_code(&self) -> Option<i32> {
        if self.completed.load(Ordering::Acquire) {
            Some(self.exit_code.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            id: self.id,
            command: self.command.clone(),
            start_time: self.start_time,
            is_running: self.is_running(),
            exit_code: self.exit_code(),
            pid: self.pid,
        }
    }

    /// The output buffer backing this process.
    pub fn output(&self) -> &Arc<OutputBuffer> {
        &self.output
    }

    /// Write to the child's stdin, appending a newline if `input` does not
    /// already end in one.
    pub async fn write_stdin(&self, input: &str) -> Result<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or_else(|| {
            Error::FailedPrecondition(format!("stdin pipe for process {} is closed", self.id))
        })?;

        let mut data = input.to_string();
        if !data.ends_with('\n') {
            data.push('\n');
        }
        stdin.write_all(data.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Deliver `signal` to the child's process group.
    pub fn signal(&self, signal: Signal) -> Result<()> {
        kill(Pid::from_raw(-(self.pid as i32)), signal)
            .map_err(|e| Error::Internal(format!("failed to signal process {}: {e}", self.id)))
    }

    /// Force-kill the process group.
    pub fn kill(&self) {
        kill_process_group(self.pid, Signal::SIGKILL);
    }

    /// Wait until the reaper has marked this process completed.
    pub async fn wait(&self) {
        if !self.is_running() {
            return;
        }
        let mut rx = self.done_rx.clone();
        // The completed flag is authoritative if the reaper is already gone.
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Force-kill and wait for the reaper, guaranteeing the completed flag
    /// is set before returning.
    pub async fn terminate(&self) {
        if self.is_running() {
            self.kill();
        }
        self.wait().await;
    }
}

/// Spawns and supervises background processes on behalf of sessions.
pub struct ProcessSupervisor {
    registry: Arc<SessionRegistry>,
    history: Arc<HistoryLog>,
    shells: Arc<ShellResolver>,
}

impl ProcessSupervisor {
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

    /// Start a background process and return its info record immediately.
    ///
    /// `timeout > 0` arms an automatic group SIGKILL; the caller observes the
    /// resulting completion through `get`, not as an API error.
    pub async fn start(&self, session_id: Uuid, request: &CommandRequest) -> Result<ProcessInfo> {
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
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(Error::Io)?;
        let pid = child
            .id()
            .ok_or_else(|| Error::Internal("spawned process has no pid".into()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Internal("stdin pipe was not available".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("stdout pipe was not available".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("stderr pipe was not available".into()))?;

        let buffer = Arc::new(OutputBuffer::new(MAX_BUFFER_LINES));
        let (done_tx, done_rx) = watch::channel(false);

        let handle = Arc::new(ProcessHandle {
            id: Uuid::new_v4(),
            command: request.command.clone(),
            start_time: Utc::now(),
            pid,
            completed: AtomicBool::new(false),
            exit_code: AtomicI32::new(0),
            stdin: Mutex::new(Some(stdin)),
            output: Arc::clone(&buffer),
            done_rx,
        });

        let stdout_buffer = Arc::clone(&buffer);
        tokio::spawn(collect_lines(stdout, move |line| {
            stdout_buffer.push_stdout(line)
        }));
        let stderr_buffer = Arc::clone(&buffer);
        tokio::spawn(collect_lines(stderr, move |line| {
            stderr_buffer.push_stderr(line)
        }));

        let reaper_handle = Arc::clone(&handle);
        let registry = Arc::clone(&self.registry);
        let timeout = request.timeout;
        tokio::spawn(async move {
            let status = if timeout > 0 {
                match tokio::time::timeout(Duration::from_secs(timeout), child.wait()).await {
                    Ok(status) => status,
                    Err(_) => {
                        warn!(process = %reaper_handle.id, timeout, "background process timed out, killing group");
                        kill_process_group(reaper_handle.pid, Signal::SIGKILL);
                        child.wait().await
                    }
                }
            } else {
                child.wait().await
            };

            let exit_code = match status {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    warn!(process = %reaper_handle.id, error = %e, "failed to reap background process");
                    -1
                }
            };

            // Drop stdin before the completed flag flips, so a writer that
            // observes completion deterministically sees a closed pipe.
            reaper_handle.stdin.lock().await.take();
            reaper_handle.exit_code.store(exit_code, Ordering::Relaxed);
            reaper_handle.completed.store(true, Ordering::Release);

            registry
                .log_activity(
                    session_id,
                    &format!(
                        "Process completed: {} (exit code: {exit_code})",
                        reaper_handle.command
                    ),
                )
                .await;
            info!(
                session = %session_id,
                process = %reaper_handle.id,
                exit_code,
                "background process completed"
            );

            // Let the collectors drain straggler bytes before the taps close.
            tokio::time::sleep(DRAIN_DELAY).await;
            reaper_handle.output.close_taps();
            let _ = done_tx.send(true);
        });

        session.register_process(Arc::clone(&handle)).await;
        session
            .log_activity(&format!(
                "Started process: {} (PID: {pid}, ID: {})",
                request.command, handle.id
            ))
            .await;
        info!(session = %session_id, process = %handle.id, pid, command = %request.command, "started background process");

        Ok(handle.info())
    }

    async fn handle(&self, session_id: Uuid, process_id: Uuid) -> Result<Arc<ProcessHandle>> {
        let session = self.registry.get(session_id).await?;
        session
            .get_process(process_id)
            .await
            .ok_or_else(|| Error::process_not_found(process_id))
    }

    /// Write input to a process's stdin.
    pub async fn send_input(&self, session_id: Uuid, process_id: Uuid, input: &str) -> Result<()> {
        let handle = self.handle(session_id, process_id).await?;
        handle.write_stdin(input).await?;
        self.registry
            .log_activity(session_id, &format!("Sent input to process {process_id}"))
            .await;
        Ok(())
    }

    /// Deliver a named signal to a process. Only SIGTERM, SIGKILL, SIGINT,
    /// and SIGHUP are accepted.
    pub async fn signal(&self, session_id: Uuid, process_id: Uuid, signal_name: &str) -> Result<()> {
        let signal = parse_signal(signal_name)?;
        let handle = self.handle(session_id, process_id).await?;
        handle.signal(signal)?;
        self.registry
            .log_activity(
                session_id,
                &format!("Sent signal {signal_name} to process {process_id}"),
            )
            .await;
        Ok(())
    }

    /// Copy of the process's output buffers (stdout lines, stderr lines).
    pub async fn output(
        &self,
        session_id: Uuid,
        process_id: Uuid,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let handle = self.handle(session_id, process_id).await?;
        Ok(handle.output().snapshot())
    }

    /// Snapshot of one process.
    pub async fn get(&self, session_id: Uuid, process_id: Uuid) -> Result<ProcessInfo> {
        let handle = self.handle(session_id, process_id).await?;
        Ok(handle.info())
    }

    /// Snapshot of every process owned by the session.
    pub async fn list(&self, session_id: Uuid) -> Result<Vec<ProcessInfo>> {
        let session = self.registry.get(session_id).await?;
        let mut infos: Vec<ProcessInfo> = session
            .processes()
            .await
            .iter()
            .map(|p| p.info())
            .collect();
        infos.sort_by_key(|info| info.start_time);
        Ok(infos)
    }
}

/// Parse one of the supported signal names.
fn parse_signal(name: &str) -> Result<Signal> {
    match name {
        "SIGTERM" => Ok(Signal::SIGTERM),
        "SIGKILL" => Ok(Signal::SIGKILL),
        "SIGINT" => Ok(Signal::SIGINT),
        "SIGHUP" => Ok(Signal::SIGHUP),
        other => Err(Error::InvalidArgument(format!(
            "unsupported signal: {other}"
        ))),
    }
}

/// Read `reader` line by line into `sink` until EOF. A final line without a
/// trailing newline is still delivered.
async fn collect_lines<R, F>(reader: R, mut sink: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(String),
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => sink(line),
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "output collector stopped");
                break;
            }
        }
    }
}
