//! Content store trait definition.

use crate::error::StoreResult;
use crate::hash::Hash;

/// A hash-addressed chunk store with a single mutable root pointer.
///
/// Stores hold **opaque byte chunks** keyed by the hash of their content.
/// Riptide owns all chunk format interpretation - stores do not understand
/// commits or maps.
///
/// # Invariants
///
/// - `put` is idempotent: storing the same bytes twice yields the same hash
/// - `get` returns exactly the bytes previously stored under that hash
/// - Chunks referenced by the root must be durable before the root swap
///   that references them returns (write-ahead-of-pointer discipline)
/// - `compare_and_swap_root` is atomic with respect to the preceding
///   `put` calls; partial visibility of a swapped-in root is not allowed
///
/// # Implementors
///
/// - [`super::MemoryStore`] - For testing and ephemeral databases
pub trait ContentStore: Send + Sync {
    /// Reads the chunk stored under `hash`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::NotFound`] if no chunk has that hash.
    fn get(&self, hash: &Hash) -> StoreResult<Vec<u8>>;

    /// Returns true if a chunk with the given hash exists.
    fn has(&self, hash: &Hash) -> StoreResult<bool>;

    /// Stores a chunk and returns its content hash.
    fn put(&self, bytes: Vec<u8>) -> StoreResult<Hash>;

    /// Returns the current root pointer, or `None` for a fresh store.
    fn root(&self) -> StoreResult<Option<Hash>>;

    /// Atomically swaps the root pointer from `old` to `new`.
    ///
    /// Returns `false` without modifying anything if the current root
    /// does not equal `old`. This is the single linearization point for
    /// all head movement in a database.
    fn compare_and_swap_root(&self, old: Option<Hash>, new: Hash) -> StoreResult<bool>;
}
