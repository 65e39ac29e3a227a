//! Error types for the sync engine.

use schoolsync_protocol::ProtocolError;
use schoolsync_store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Server answered with a non-success status.
    #[error("server error {status}: {body}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },

    /// Response could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local store error while applying or reading changes.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Required configuration is missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// Another agent holds the instance lock.
    #[error("another agent holds the lock at {}", path.display())]
    Lock {
        /// Lock file path.
        path: PathBuf,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error classes the supervisor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network failure or non-2xx response; retried next cycle.
    Transport,
    /// Local apply failure; transaction rolled back, retried next cycle.
    Apply,
    /// Missing configuration; stage skipped.
    Config,
    /// Lock contention; agent exits quietly.
    Lock,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a configuration error naming the missing item.
    pub fn missing(item: &str) -> Self {
        Self::Config(format!("{item} is not configured"))
    }

    /// Maps the error onto the supervisor's taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            SyncError::Transport { .. } | SyncError::Server { .. } | SyncError::Protocol(_) => {
                ErrorClass::Transport
            }
            SyncError::Store(_) | SyncError::Io(_) => ErrorClass::Apply,
            SyncError::Config(_) => ErrorClass::Config,
            SyncError::Lock { .. } => ErrorClass::Lock,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Server { .. } | SyncError::Protocol(_) => true,
            _ => false,
        }
    }

    /// Returns true if the failing stage should be reported as skipped.
    pub fn is_skip(&self) -> bool {
        self.class() == ErrorClass::Config
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        SyncError::Protocol(err.to_string())
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Store(StoreError::from(err))
    }
}
