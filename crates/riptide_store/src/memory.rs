//! In-memory content store for testing.

use crate::error::{StoreError, StoreResult};
use crate::hash::Hash;
use crate::store::ContentStore;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;

/// An in-memory content store.
///
/// This store keeps all chunks in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral databases that don't need persistence
///
/// # Thread Safety
///
/// The store is thread-safe and can be shared across threads. The root
/// pointer is guarded by its own lock so `compare_and_swap_root` is a
/// true atomic compare-and-swap.
#[derive(Debug, Default)]
pub struct MemoryStore {
    chunks: RwLock<HashMap<Hash, Vec<u8>>>,
    root: Mutex<Option<Hash>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of chunks held.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.read().len()
    }
}

impl ContentStore for MemoryStore {
    fn get(&self, hash: &Hash) -> StoreResult<Vec<u8>> {
        self.chunks
            .read()
            .get(hash)
            .cloned()
            .ok_or(StoreError::NotFound(*hash))
    }

    fn has(&self, hash: &Hash) -> StoreResult<bool> {
        Ok(self.chunks.read().contains_key(hash))
    }

    fn put(&self, bytes: Vec<u8>) -> StoreResult<Hash> {
        let hash = Hash::of(&bytes);
        self.chunks.write().insert(hash, bytes);
        Ok(hash)
    }

    fn root(&self) -> StoreResult<Option<Hash>> {
        Ok(*self.root.lock())
    }

    fn compare_and_swap_root(&self, old: Option<Hash>, new: Hash) -> StoreResult<bool> {
        let mut root = self.root.lock();
        if *root != old {
            return Ok(false);
        }
        *root = Some(new);
        Ok(true)
    }
}
