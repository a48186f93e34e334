//! Session lifecycle and registry
//!
//! A session pins a working directory and an environment on the host. Both
//! services resolve every request through the registry, which slides the
//! 24-hour expiry on each successful lookup and sweeps expired sessions in
//! the background.
//!
//! Lock hierarchy: registry map lock, then per-session mutex, then output
//! buffer mutex. Session mutexes are only taken after the registry guard has
//! been dropped; expiry bookkeeping lives in atomics so the sweeper never
//! touches a session mutex while scanning.

use crate::error::{Error, Result};
use crate::process::ProcessHandle;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Sessions expire 24 hours after their last activity.
const SESSION_TTL_HOURS: i64 = 24;

/// The activity log keeps the most recent 100 entries.
const ACTIVITY_LOG_CAP: usize = 100;

/// How often the sweeper scans for expired sessions.
pub const SWEEP_PERIOD: std::time::Duration = std::time::Duration::from_secs(600);

/// Mutable per-session state, guarded by the session mutex.
#[derive(Default)]
struct SessionState {
    working_dir: Option<PathBuf>,
    env_vars: HashMap<String, String>,
    activity_log: VecDeque<String>,
    processes: HashMap<Uuid, Arc<ProcessHandle>>,
}

/// A server-side session record.
///
/// Timestamps are atomics (millisecond epoch) so lookups and the sweeper can
/// read and slide expiry without the session mutex.
pub struct Session {
    /// Unique session id
    pub id: Uuid,
    /// Creation timestamp, immutable
    pub created_at: DateTime<Utc>,
    last_active_ms: AtomicI64,
    expires_at_ms: AtomicI64,
    active: AtomicBool,
    state: Mutex<SessionState>,
}

impl Session {
    fn new(ttl: Duration) -> Self {
        let now = Utc::now();
        let mut env_vars = HashMap::new();
        env_vars.insert("SHELL".to_string(), default_shell());

        let mut activity_log = VecDeque::new();
        activity_log.push_back(format!("{}: Session created", now.to_rfc3339()));

        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_active_ms: AtomicI64::new(now.timestamp_millis()),
            expires_at_ms: AtomicI64::new((now + ttl).timestamp_millis()),
            active: AtomicBool::new(true),
            state: Mutex::new(SessionState {
                env_vars,
                activity_log,
                ..Default::default()
            }),
        }
    }

    /// Slide `last_active` and `expires_at` forward from now.
    fn touch(&self, ttl: Duration) {
        let now = Utc::now();
        self.last_active_ms
            .store(now.timestamp_millis(), Ordering::Relaxed);
        self.expires_at_ms
            .store((now + ttl).timestamp_millis(), Ordering::Relaxed);
    }

    /// Whether the session is still live (not deleted or expired away).
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Move the expiry deadline into the past (test support).
    #[cfg(test)]
    pub(crate) fn force_expire(&self) {
        self.expires_at_ms
            .store(Utc::now().timestamp_millis() - 1_000, Ordering::Relaxed);
    }

    /// Last activity timestamp.
    pub fn last_active(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_active_ms.load(Ordering::Relaxed))
            .unwrap_or_default()
    }

    /// Expiry deadline.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.expires_at_ms.load(Ordering::Relaxed))
            .unwrap_or_default()
    }

    /// Current working directory, if one has been set.
    pub async fn working_dir(&self) -> Option<PathBuf> {
        self.state.lock().await.working_dir.clone()
    }

    /// Working directory, or a `FailedPrecondition` error when unset.
    pub async fn require_working_dir(&self) -> Result<PathBuf> {
        self.working_dir().await.ok_or_else(|| {
            Error::FailedPrecondition(format!(
                "working directory not set for session {}",
                self.id
            ))
        })
    }

    /// Snapshot of the session environment.
    pub async fn env_vars(&self) -> HashMap<String, String> {
        self.state.lock().await.env_vars.clone()
    }

    /// Append a timestamped entry to the activity log, evicting the oldest
    /// entry beyond the cap. Informational only; never fails.
    pub async fn log_activity(&self, activity: &str) {
        let entry = format!("{}: {}", Utc::now().to_rfc3339(), activity);
        let mut state = self.state.lock().await;
        state.activity_log.push_back(entry);
        while state.activity_log.len() > ACTIVITY_LOG_CAP {
            state.activity_log.pop_front();
        }
    }

    /// Attach a background process to this session.
    pub async fn register_process(&self, handle: Arc<ProcessHandle>) {
        self.state.lock().await.processes.insert(handle.id, handle);
    }

    /// Look up one owned process.
    pub async fn get_process(&self, process_id: Uuid) -> Option<Arc<ProcessHandle>> {
        self.state.lock().await.processes.get(&process_id).cloned()
    }

    /// Snapshot of all owned processes.
    pub async fn processes(&self) -> Vec<Arc<ProcessHandle>> {
        self.state.lock().await.processes.values().cloned().collect()
    }

    /// Drain the owned process set (used during session teardown).
    pub async fn take_processes(&self) -> Vec<Arc<ProcessHandle>> {
        self.state.lock().await.processes.drain().map(|(_, p)| p).collect()
    }

    /// Materialize the serializable view of this session.
    pub async fn view(&self) -> SessionView {
        let state = self.state.lock().await;
        SessionView {
            id: self.id,
            created_at: self.created_at,
            last_active: self.last_active(),
            working_dir: state
                .working_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            is_active: self.is_active(),
            expires_at: self.expires_at(),
            activity_log: state.activity_log.iter().cloned().collect(),
            env_vars: state.env_vars.clone(),
        }
    }
}

/// Wire representation of a session. Runtime state (process handles, pipes,
/// locks) never appears here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub working_dir: String,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub activity_log: Vec<String>,
    pub env_vars: HashMap<String, String>,
}

/// Process-wide session registry.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    ttl: Duration,
}

impl SessionRegistry {
    /// Create an empty registry with the default 24-hour expiry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: Duration::hours(SESSION_TTL_HOURS),
        }
    }

    /// Spawn the periodic expiry sweeper.
    pub fn start_sweeper(self: &Arc<Self>, period: std::time::Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick fires immediately; skip it so a fresh server
            // does not sweep before anything can exist.
            interval.tick().await;
            loop {
                interval.tick().await;
                registry.sweep().await;
            }
        })
    }

    /// Delete every session whose deadline has passed. Best-effort: failures
    /// are logged and the scan continues.
    pub(crate) async fn sweep(&self) {
        let now = Utc::now().timestamp_millis();
        let expired: Vec<Uuid> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .filter(|(_, s)| s.expires_at_ms.load(Ordering::Relaxed) < now)
                .map(|(id, _)| *id)
                .collect()
        };

        for id in expired {
            match self.delete(id).await {
                Ok(()) => info!(session = %id, "expired inactive session"),
                Err(e) => warn!(session = %id, error = %e, "failed to expire session"),
            }
        }
    }

    /// Create a new session.
    pub async fn create(&self) -> SessionView {
        let session = Arc::new(Session::new(self.ttl));
        let view = session.view().await;
        self.sessions.write().await.insert(session.id, session);
        info!(session = %view.id, "created new session");
        view
    }

    /// Resolve an active session, sliding its expiry forward.
    pub async fn get(&self, id: Uuid) -> Result<Arc<Session>> {
        let session = {
            let sessions = self.sessions.read().await;
            sessions.get(&id).cloned()
        };

        match session {
            Some(s) if s.is_active() => {
                s.touch(self.ttl);
                Ok(s)
            }
            _ => Err(Error::session_not_found(id)),
        }
    }

    /// Resolve a session and return its serializable view.
    pub async fn view(&self, id: Uuid) -> Result<SessionView> {
        let session = self.get(id).await?;
        Ok(session.view().await)
    }

    /// Snapshot views of every session.
    pub async fn list(&self) -> Vec<SessionView> {
        let sessions: Vec<Arc<Session>> = {
            let guard = self.sessions.read().await;
            guard.values().cloned().collect()
        };

        let mut views = Vec::with_capacity(sessions.len());
        for session in sessions {
            views.push(session.view().await);
        }
        views
    }

    /// Delete a session, force-terminating every process it owns. The kill
    /// runs after the registry lock is released.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let session = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(&id)
        }
        .ok_or_else(|| Error::session_not_found(id))?;

        session.active.store(false, Ordering::Relaxed);

        let processes = session.take_processes().await;
        for process in processes {
            process.terminate().await;
        }

        info!(session = %id, "deleted session");
        Ok(())
    }

    /// Set the session working directory. The path must exist and be a
    /// directory; it is canonicalized before storage. Write permissions are
    /// not checked here — execution surfaces those errors at run time.
    pub async fn set_working_dir(&self, id: Uuid, dir: &str) -> Result<SessionView> {
        let session = self.get(id).await?;

        let meta = tokio::fs::metadata(dir)
            .await
            .map_err(|_| Error::InvalidArgument(format!("directory does not exist: {dir}")))?;
        if !meta.is_dir() {
            return Err(Error::InvalidArgument(format!("not a directory: {dir}")));
        }
        let abs = tokio::fs::canonicalize(dir).await?;

        {
            let mut state = session.state.lock().await;
            state.working_dir = Some(abs.clone());
        }
        session
            .log_activity(&format!("Set working directory to {}", abs.display()))
            .await;

        info!(session = %id, dir = %abs.display(), "set working directory");
        Ok(session.view().await)
    }

    /// Set one environment variable.
    pub async fn set_env(&self, id: Uuid, key: &str, value: &str) -> Result<()> {
        let session = self.get(id).await?;
        {
            let mut state = session.state.lock().await;
            state.env_vars.insert(key.to_string(), value.to_string());
        }
        session
            .log_activity(&format!("Set environment variable: {key}={value}"))
            .await;
        Ok(())
    }

    /// Merge a batch of environment variables in one lock acquisition.
    pub async fn set_env_batch(&self, id: Uuid, vars: HashMap<String, String>) -> Result<()> {
        let session = self.get(id).await?;
        let count = vars.len();
        {
            let mut state = session.state.lock().await;
            state.env_vars.extend(vars);
        }
        session
            .log_activity(&format!("Set {count} environment variables"))
            .await;
        Ok(())
    }

    /// Remove one environment variable. Removing an absent key is not an
    /// error.
    pub async fn unset_env(&self, id: Uuid, key: &str) -> Result<()> {
        let session = self.get(id).await?;
        {
            let mut state = session.state.lock().await;
            state.env_vars.remove(key);
        }
        session
            .log_activity(&format!("Unset environment variable: {key}"))
            .await;
        Ok(())
    }

    /// Snapshot of a session's environment.
    pub async fn env_vars(&self, id: Uuid) -> Result<HashMap<String, String>> {
        let session = self.get(id).await?;
        Ok(session.env_vars().await)
    }

    /// Best-effort activity logging for collaborating services. Missing or
    /// inactive sessions are ignored; this must never fail an operation.
    pub async fn log_activity(&self, id: Uuid, activity: &str) {
        let session = {
            let sessions = self.sessions.read().await;
            sessions.get(&id).cloned()
        };
        if let Some(session) = session {
            if session.is_active() {
                session.log_activity(activity).await;
            }
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The host's default shell: `$SHELL` when set, otherwise a platform
/// fallback.
pub fn default_shell() -> String {
    match std::env::var("SHELL") {
        Ok(shell) if !shell.is_empty() => shell,
        _ => {
            if cfg!(windows) {
                "cmd.exe".to_string()
            } else {
                "/bin/bash".to_string()
            }
        }
    }
}
