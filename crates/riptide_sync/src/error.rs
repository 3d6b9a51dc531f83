//! Error types for the sync engine.

use riptide_store::Hash;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The server's `lastMutationID` moved backward. The server is not
    /// allowed to forget mutations the client has already observed.
    #[error("server lastMutationID {got} is less than base {base}; ignoring pull")]
    Regression {
        /// What the server reported.
        got: u64,
        /// What the base snapshot had already recorded.
        base: u64,
    },

    /// The patched map's checksum does not match what the server
    /// declared. Client and server state have diverged; the pull is
    /// abandoned with nothing written.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Checksum the server declared.
        expected: String,
        /// Checksum the patched map actually has.
        actual: String,
    },

    /// A wire payload was malformed.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered with a non-200 status; the body is carried
    /// verbatim as the message.
    #[error("server error: {0}")]
    Server(String),

    /// The server reported no new state for this client.
    #[error("no progress: server state unchanged since base snapshot")]
    NoProgress,

    /// The request hit its deadline.
    #[error("request timed out")]
    Timeout,

    /// Transport-level failure (DNS, refused connection, broken pipe).
    #[error("network error: {0}")]
    Network(String),

    /// Replay met a commit that is neither Tx nor Reorder. The DAG has
    /// an impossible shape; the sync cycle halts rather than guess.
    #[error("cannot replay commit of type {kind}: {commit}")]
    UnsupportedCommitType {
        /// The offending commit.
        commit: Hash,
        /// Its type name.
        kind: &'static str,
    },

    /// A replayed mutation names a mutator the host never registered.
    #[error("unknown mutator: {0:?}")]
    MutatorNotFound(String),

    /// A mutator failed while being replayed.
    #[error("mutator {name:?} failed during replay: {message}")]
    MutatorFailed {
        /// The mutator that failed.
        name: String,
        /// What it reported.
        message: String,
    },

    /// Database error, including lost head races during promotion.
    #[error(transparent)]
    Db(#[from] riptide_db::DbError),

    /// Content store error.
    #[error("store error: {0}")]
    Store(#[from] riptide_store::StoreError),

    /// Map or patch error.
    #[error("kv error: {0}")]
    Kv(#[from] riptide_kv::KvError),

    /// The orchestrator was asked to run while a cycle is active.
    #[error("sync already in progress (phase {phase})")]
    CycleActive {
        /// The phase the engine is in.
        phase: &'static str,
    },
}

impl SyncError {
    /// Returns true if the head raced and the caller should restart the
    /// cycle from `begin_sync`.
    #[must_use]
    pub fn is_concurrent_modification(&self) -> bool {
        matches!(
            self,
            SyncError::Db(riptide_db::DbError::ConcurrentModification)
        )
    }

    /// Returns true for transport-level failures worth retrying with
    /// backoff. Retrying is the caller's decision; nothing in this
    /// crate retries internally.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Timeout | SyncError::Network(_))
    }
}
