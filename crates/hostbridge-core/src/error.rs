//! Error types for hostbridge-core
//!
//! One taxonomy is shared by every service layer so the HTTP edge can map
//! errors to status codes in a single place.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown session or process id
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller supplied something unusable (bad path, bad signal name, ...)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation requires state the session does not have yet
    #[error("precondition failed: {0}")]
    FailedPrecondition(String),

    /// File system or pipe I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Unrecoverable internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for the common "session X not found" case.
    pub fn session_not_found(id: impl std::fmt::Display) -> Self {
        Error::NotFound(format!("session {} not found or inactive", id))
    }

    /// Shorthand for the common "process X not found" case.
    pub fn process_not_found(id: impl std::fmt::Display) -> Self {
        Error::NotFound(format!("process {} not found", id))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
