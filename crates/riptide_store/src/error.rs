//! Error types for store operations.

use crate::hash::Hash;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced chunk does not exist in the store.
    #[error("chunk not found: {0}")]
    NotFound(Hash),

    /// A hash string could not be parsed.
    #[error("malformed hash: {0}")]
    MalformedHash(String),

    /// The underlying storage failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    /// Creates a storage error from any message.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}
