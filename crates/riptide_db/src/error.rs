//! Error types for database operations.

use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in database operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Content store error, including missing chunks.
    #[error("store error: {0}")]
    Store(#[from] riptide_store::StoreError),

    /// Map or checksum error.
    #[error("kv error: {0}")]
    Kv(#[from] riptide_kv::KvError),

    /// A commit chunk could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A structural DAG invariant was violated.
    #[error("corrupt commit history: {message}")]
    Corrupt {
        /// Description of the violated invariant.
        message: String,
    },

    /// The head moved underneath a commit attempt.
    #[error("head changed concurrently; reopen against the new head and retry")]
    ConcurrentModification,

    /// The caller misused the API.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the misuse.
        message: String,
    },
}

impl DbError {
    /// Creates a corrupt history error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
