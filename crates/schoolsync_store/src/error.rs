//! Error types for the local store.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or writing the local store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON error while reading or writing a payload.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A table the operation requires does not exist locally.
    #[error("table not found: {name}")]
    TableNotFound {
        /// Table name.
        name: String,
    },

    /// Stored or incoming data is unusable.
    #[error("invalid data: {message}")]
    InvalidData {
        /// Description of the problem.
        message: String,
    },
}

impl StoreError {
    /// Creates an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Creates a table-not-found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Self::TableNotFound { name: name.into() }
    }
}
