//! Error types for the dispatch surface.

use thiserror::Error;

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors that can occur at the dispatch boundary.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The database name was empty.
    #[error("dbName must be non-empty")]
    EmptyDatabaseName,

    /// The named database is not open.
    #[error("specified database is not open")]
    DatabaseNotOpen,

    /// The RPC name is not part of the surface.
    #[error("unsupported rpc name: {0}")]
    UnknownRpc(String),

    /// The request referenced a transaction this connection does not
    /// hold.
    #[error("unknown transaction id: {0}")]
    UnknownTransaction(u64),

    /// The request body could not be decoded.
    #[error("invalid request: {0}")]
    BadRequest(#[from] serde_json::Error),

    /// Database error.
    #[error(transparent)]
    Db(#[from] riptide_db::DbError),

    /// Sync error.
    #[error(transparent)]
    Sync(#[from] riptide_sync::SyncError),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] riptide_store::StoreError),

    /// A handler panicked; the fault was contained to this call.
    #[error("internal error: {0}")]
    Internal(String),
}
