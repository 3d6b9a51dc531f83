//! Database handle: head management and the transaction lifecycle.

use crate::commit::{next_mutation_id, Commit, CommitMeta};
use crate::error::{DbError, DbResult};
use crate::transaction::Transaction;
use riptide_kv::Map;
use riptide_store::{ContentStore, Hash};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A handle to one replicated database.
///
/// The handle itself is cheap to clone and holds no mutable state: the
/// head pointer lives in the content store's root, and every head
/// movement goes through its compare-and-swap. That single CAS is what
/// linearizes concurrent transactions and sync cycles.
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn ContentStore>,
    client_id: String,
}

impl Database {
    /// Opens a database on `store`, generating a fresh client ID.
    ///
    /// A fresh store is bootstrapped with a genesis snapshot: empty map,
    /// no server state, `last_mutation_id` 0.
    pub fn open(store: Arc<dyn ContentStore>) -> DbResult<Self> {
        Self::with_client_id(store, uuid::Uuid::new_v4().to_string())
    }

    /// Opens a database with a caller-provided client ID.
    ///
    /// Embedders that persist the client ID alongside their store should
    /// use this so mutation IDs stay continuous across restarts.
    pub fn with_client_id(store: Arc<dyn ContentStore>, client_id: String) -> DbResult<Self> {
        let db = Self { store, client_id };
        db.bootstrap()?;
        Ok(db)
    }

    fn bootstrap(&self) -> DbResult<()> {
        if self.store.root()?.is_some() {
            return Ok(());
        }
        let map = Map::new();
        let data = self.store.put(map.to_chunk()?)?;
        let genesis = Commit {
            basis: None,
            data,
            checksum: map.checksum().to_string(),
            meta: CommitMeta::Snapshot {
                server_state_id: String::new(),
                last_mutation_id: 0,
            },
        };
        let hash = genesis.write(self.store.as_ref())?;
        // Another opener may win the race; either way a genesis exists.
        let swapped = self.store.compare_and_swap_root(None, hash)?;
        if swapped {
            debug!(head = %hash, "bootstrapped genesis snapshot");
        }
        Ok(())
    }

    /// Returns the store this database lives in.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Returns this client's ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the current head commit hash.
    pub fn head(&self) -> DbResult<Hash> {
        self.store
            .root()?
            .ok_or_else(|| DbError::corrupt("store has no root after bootstrap"))
    }

    /// Reads the current head commit.
    pub fn head_commit(&self) -> DbResult<(Hash, Commit)> {
        let hash = self.head()?;
        Ok((hash, Commit::read(self.store.as_ref(), &hash)?))
    }

    /// Opens a transaction against the current head.
    ///
    /// An empty `mutator_name` opens a read-only transaction, which can
    /// never be committed, only closed.
    pub fn open_transaction(&self, mutator_name: &str, mutator_args: Value) -> DbResult<Transaction> {
        let (head, commit) = self.head_commit()?;
        let map = commit.load_map(self.store.as_ref())?;
        Ok(Transaction::new(
            head,
            map,
            mutator_name.to_string(),
            mutator_args,
        ))
    }

    /// Seals a mutating transaction into a new Tx commit and advances
    /// the head.
    ///
    /// The commit's basis is the head as re-read here, not as of open
    /// time; the CAS from the transaction's base is what detects a race
    /// with a concurrent committer. On a lost race this fails with
    /// [`DbError::ConcurrentModification`] and writes nothing the head
    /// can reach - the caller reopens against the new head and retries.
    pub fn commit(&self, tx: &mut Transaction) -> DbResult<Hash> {
        tx.ensure_open()?;
        if tx.is_read_only() {
            return Err(DbError::invalid_argument(
                "cannot commit a read-only transaction",
            ));
        }

        let head = self.head()?;
        if head != tx.base_head() {
            return Err(DbError::ConcurrentModification);
        }

        let store = self.store.as_ref();
        let mutation_id = next_mutation_id(store, &head)?;
        let map = tx.map();
        let data = store.put(map.to_chunk()?)?;
        let commit = Commit {
            basis: Some(head),
            data,
            checksum: map.checksum().to_string(),
            meta: CommitMeta::Tx {
                mutator_name: tx.mutator_name().to_string(),
                mutator_args: tx.mutator_args().clone(),
                mutation_id,
                origin_client_id: self.client_id.clone(),
                bundle: None,
            },
        };
        let new_head = commit.write(store)?;

        if !self
            .store
            .compare_and_swap_root(Some(tx.base_head()), new_head)?
        {
            return Err(DbError::ConcurrentModification);
        }
        tx.mark_committed();
        debug!(head = %new_head, mutation_id, mutator = tx.mutator_name(), "committed");
        Ok(new_head)
    }

    /// Swaps the head from `old` to `new`.
    ///
    /// Used by the sync orchestrator to promote a rebased tip. Fails
    /// with [`DbError::ConcurrentModification`] if the head is no
    /// longer `old`.
    pub fn set_head(&self, old: Hash, new: Hash) -> DbResult<()> {
        if self.store.compare_and_swap_root(Some(old), new)? {
            Ok(())
        } else {
            Err(DbError::ConcurrentModification)
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}
