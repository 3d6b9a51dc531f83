//! Error types for map operations.

use thiserror::Error;

/// Result type for map operations.
pub type KvResult<T> = Result<T, KvError>;

/// Errors that can occur in map operations.
#[derive(Debug, Error)]
pub enum KvError {
    /// A checksum string could not be parsed.
    #[error("malformed checksum: {0:?}")]
    MalformedChecksum(String),

    /// A patch operation could not be applied to the base map.
    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    /// A serialized map chunk could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl KvError {
    /// Creates an invalid patch error.
    pub fn invalid_patch(message: impl Into<String>) -> Self {
        Self::InvalidPatch(message.into())
    }
}
