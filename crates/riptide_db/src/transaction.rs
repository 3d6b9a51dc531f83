//! Transaction state.

use crate::error::{DbError, DbResult};
use riptide_kv::{Map, ScanOptions};
use riptide_store::Hash;
use serde_json::Value;

/// Lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// The transaction can read and (if mutating) write.
    Open,
    /// The transaction produced a commit.
    Committed,
    /// The transaction was discarded.
    Closed,
}

/// An open transaction against a snapshot of the head's map.
///
/// The transaction owns a working copy of the map; reads and writes
/// never touch the store until [`crate::Database::commit`]. A
/// transaction opened without a mutator name is read-only and can only
/// be closed.
#[derive(Debug)]
pub struct Transaction {
    base_head: Hash,
    map: Map,
    mutator_name: String,
    mutator_args: Value,
    state: TransactionState,
}

impl Transaction {
    pub(crate) fn new(base_head: Hash, map: Map, mutator_name: String, mutator_args: Value) -> Self {
        Self {
            base_head,
            map,
            mutator_name,
            mutator_args,
            state: TransactionState::Open,
        }
    }

    /// The head commit this transaction was opened against.
    #[must_use]
    pub fn base_head(&self) -> Hash {
        self.base_head
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns true while the transaction can still be used.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == TransactionState::Open
    }

    /// Returns true if the transaction cannot be committed.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.mutator_name.is_empty()
    }

    /// Returns the value for `key` in the overlay.
    pub fn get(&self, key: &str) -> DbResult<Option<&Value>> {
        self.ensure_open()?;
        Ok(self.map.get(key))
    }

    /// Returns true if `key` is present in the overlay.
    pub fn has(&self, key: &str) -> DbResult<bool> {
        self.ensure_open()?;
        Ok(self.map.has(key))
    }

    /// Scans the overlay in key order.
    ///
    /// Scans are restartable: there is no cursor state, a fresh call
    /// re-scans from scratch.
    pub fn scan(&self, options: &ScanOptions) -> DbResult<Vec<(String, Value)>> {
        self.ensure_open()?;
        Ok(self.map.scan(options))
    }

    /// Inserts or replaces a value in the overlay.
    pub fn put(&mut self, key: String, value: Value) -> DbResult<()> {
        self.ensure_mutable()?;
        self.map.put(key, value);
        Ok(())
    }

    /// Removes a key from the overlay. Returns true if it was present.
    pub fn del(&mut self, key: &str) -> DbResult<bool> {
        self.ensure_mutable()?;
        Ok(self.map.del(key))
    }

    /// Discards the overlay.
    ///
    /// Legal after a commit (no-op) or instead of one; no half-committed
    /// state survives either way.
    pub fn close(&mut self) {
        if self.state == TransactionState::Open {
            self.state = TransactionState::Closed;
        }
    }

    pub(crate) fn mutator_name(&self) -> &str {
        &self.mutator_name
    }

    pub(crate) fn mutator_args(&self) -> &Value {
        &self.mutator_args
    }

    pub(crate) fn map(&self) -> &Map {
        &self.map
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
    }

    pub(crate) fn ensure_open(&self) -> DbResult<()> {
        match self.state {
            TransactionState::Open => Ok(()),
            TransactionState::Committed => {
                Err(DbError::invalid_argument("transaction already committed"))
            }
            TransactionState::Closed => Err(DbError::invalid_argument("transaction closed")),
        }
    }

    fn ensure_mutable(&self) -> DbResult<()> {
        self.ensure_open()?;
        if self.is_read_only() {
            return Err(DbError::invalid_argument(
                "cannot write in a read-only transaction",
            ));
        }
        Ok(())
    }
}
