//! Hostbridge Core - Sessions and Shell Execution
//!
//! This crate provides the shared machinery for the hostbridge services:
//! - Sessions: registry, working directory, environment, expiry sweeping
//! - Exec: foreground command execution with timeouts
//! - Process: background process supervision with buffered output
//! - History: per-session command history
//! - Shell: shell selection and validation
//! - System: host introspection

#![forbid(unsafe_code)]

pub mod error;
pub mod exec;
pub mod history;
pub mod process;
pub mod session;
pub mod shell;
pub mod system;

pub use error::{Error, Result};
pub use exec::{BatchCommandRequest, CommandExecutor, CommandOutput, CommandRequest};
pub use history::{HistoryEntry, HistoryLog};
pub use process::{OutputBuffer, ProcessHandle, ProcessInfo, ProcessSupervisor, MAX_BUFFER_LINES};
pub use session::{default_shell, Session, SessionRegistry, SessionView, SWEEP_PERIOD};
pub use shell::{available_shells, ShellResolver, DEFAULT_SHELL};
pub use system::{system_info, SystemInfo};
