//! The commit DAG node format and basis-chain navigation.

use crate::error::{DbError, DbResult};
use riptide_kv::Map;
use riptide_store::{ContentStore, Hash};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An immutable DAG node, identified by the content hash of its
/// serialized form.
///
/// Commits are written once and never mutated. Equality of two commits
/// is hash equality, which the rebase fast-forward check relies on, so
/// serialization must be deterministic: serde's fixed struct field
/// order plus the ordered map chunk encoding give us that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// The previous commit, absent only for the genesis snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basis: Option<Hash>,
    /// Chunk holding the map of application state at this commit.
    pub data: Hash,
    /// The map's checksum, stored redundantly so divergence checks never
    /// need to materialize the map.
    pub checksum: String,
    /// Type-specific fields.
    pub meta: CommitMeta,
}

/// The closed set of commit types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CommitMeta {
    /// Server-confirmed state.
    #[serde(rename_all = "camelCase")]
    Snapshot {
        /// Opaque token identifying the server-side state.
        #[serde(rename = "serverStateID")]
        server_state_id: String,
        /// Highest mutation ID the server had applied as of this snapshot.
        #[serde(rename = "lastMutationID")]
        last_mutation_id: u64,
    },
    /// One locally applied mutation.
    #[serde(rename_all = "camelCase")]
    Tx {
        /// Name of the mutator that produced this commit.
        mutator_name: String,
        /// Mutator arguments, opaque to the core.
        mutator_args: Value,
        /// Per-client mutation ID, strictly increasing.
        #[serde(rename = "mutationID")]
        mutation_id: u64,
        /// The client that created the mutation.
        #[serde(rename = "originClientID")]
        origin_client_id: String,
        /// Reference to the mutator code bundle used, opaque to the core.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bundle: Option<Hash>,
    },
    /// A mutation replayed onto a different basis during rebase. The
    /// mutator identity lives on the final target, reached through
    /// [`final_reorder_target`].
    #[serde(rename_all = "camelCase")]
    Reorder {
        /// The Tx or Reorder commit this replays.
        original: Hash,
    },
}

impl Commit {
    /// Reads and decodes the commit stored under `hash`.
    pub fn read(store: &dyn ContentStore, hash: &Hash) -> DbResult<Self> {
        let bytes = store.get(hash)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Serializes this commit and writes it to the store.
    ///
    /// Returns the commit's identity: the content hash of its encoding.
    pub fn write(&self, store: &dyn ContentStore) -> DbResult<Hash> {
        let bytes = serde_json::to_vec(self)?;
        Ok(store.put(bytes)?)
    }

    /// Returns true for snapshot commits.
    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        matches!(self.meta, CommitMeta::Snapshot { .. })
    }

    /// Returns the commit type's name, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self.meta {
            CommitMeta::Snapshot { .. } => "snapshot",
            CommitMeta::Tx { .. } => "tx",
            CommitMeta::Reorder { .. } => "reorder",
        }
    }

    /// For snapshots, the server's last applied mutation ID.
    #[must_use]
    pub fn last_mutation_id(&self) -> Option<u64> {
        match self.meta {
            CommitMeta::Snapshot {
                last_mutation_id, ..
            } => Some(last_mutation_id),
            _ => None,
        }
    }

    /// For snapshots, the server state token.
    #[must_use]
    pub fn server_state_id(&self) -> Option<&str> {
        match &self.meta {
            CommitMeta::Snapshot {
                server_state_id, ..
            } => Some(server_state_id),
            _ => None,
        }
    }

    /// Resolves this commit's basis.
    ///
    /// Returns `Ok(None)` for the genesis snapshot; fails with a
    /// `NotFound` store error if the basis chunk is missing.
    pub fn basis(&self, store: &dyn ContentStore) -> DbResult<Option<(Hash, Commit)>> {
        match self.basis {
            Some(hash) => Ok(Some((hash, Commit::read(store, &hash)?))),
            None => Ok(None),
        }
    }

    /// Loads the map this commit's `data` references and verifies it
    /// against the stored checksum.
    pub fn load_map(&self, store: &dyn ContentStore) -> DbResult<Map> {
        let bytes = store.get(&self.data)?;
        let map = Map::from_chunk(&bytes)?;
        if map.checksum().to_string() != self.checksum {
            return Err(DbError::corrupt(format!(
                "commit checksum {} does not match map checksum {}",
                self.checksum,
                map.checksum()
            )));
        }
        Ok(map)
    }
}

/// Walks the basis chain from `hash` until a snapshot is reached.
///
/// The root of every history is a snapshot, so running out of chain
/// means the DAG is corrupt, not that there is nothing to find.
pub fn base_snapshot(store: &dyn ContentStore, hash: &Hash) -> DbResult<(Hash, Commit)> {
    let mut hash = *hash;
    let mut commit = Commit::read(store, &hash)?;
    loop {
        if commit.is_snapshot() {
            return Ok((hash, commit));
        }
        match commit.basis(store)? {
            Some((h, c)) => {
                hash = h;
                commit = c;
            }
            None => {
                return Err(DbError::corrupt(format!(
                    "basis chain of {hash} exhausted without reaching a snapshot"
                )))
            }
        }
    }
}

/// Unwraps reorder commits until the underlying Tx commit is found.
///
/// Reorder chains are finite and acyclic by construction; a chain that
/// bottoms out in anything other than a Tx is corrupt.
pub fn final_reorder_target(store: &dyn ContentStore, hash: &Hash) -> DbResult<(Hash, Commit)> {
    let mut hash = *hash;
    let mut commit = Commit::read(store, &hash)?;
    loop {
        match commit.meta {
            CommitMeta::Tx { .. } => return Ok((hash, commit)),
            CommitMeta::Reorder { original } => {
                hash = original;
                commit = Commit::read(store, &hash)?;
            }
            CommitMeta::Snapshot { .. } => {
                return Err(DbError::corrupt(format!(
                    "reorder chain ends in snapshot {hash}"
                )))
            }
        }
    }
}

/// A local mutation not yet reflected in the base snapshot's
/// `last_mutation_id`, ready for push or replay.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    /// The Tx or Reorder commit carrying the mutation.
    pub commit: Hash,
    /// The mutation's per-client ID.
    pub mutation_id: u64,
    /// Mutator name, taken from the final reorder target.
    pub name: String,
    /// Mutator arguments, taken from the final reorder target.
    pub args: Value,
}

/// Computes the pending mutations reachable from `head`, oldest first.
///
/// Pending status is always re-derived from the base snapshot's
/// `last_mutation_id`; push keeps no bookkeeping of its own, so a
/// mutation drops out of this list exactly when a pull confirms the
/// server applied it.
pub fn pending_mutations(store: &dyn ContentStore, head: &Hash) -> DbResult<Vec<PendingMutation>> {
    let (snapshot_hash, snapshot) = base_snapshot(store, head)?;
    let last_applied = snapshot
        .last_mutation_id()
        .ok_or_else(|| DbError::corrupt(format!("{snapshot_hash} is not a snapshot")))?;

    let mut pending = Vec::new();
    let mut hash = *head;
    let mut commit = Commit::read(store, &hash)?;
    while !commit.is_snapshot() {
        let (_, target) = final_reorder_target(store, &hash)?;
        if let CommitMeta::Tx {
            mutator_name,
            mutator_args,
            mutation_id,
            ..
        } = target.meta
        {
            if mutation_id > last_applied {
                pending.push(PendingMutation {
                    commit: hash,
                    mutation_id,
                    name: mutator_name,
                    args: mutator_args,
                });
            }
        }
        match commit.basis(store)? {
            Some((h, c)) => {
                hash = h;
                commit = c;
            }
            None => break,
        }
    }
    pending.reverse();
    Ok(pending)
}

/// Allocates the next mutation ID for a commit on top of `head`.
///
/// IDs are gapless: the successor of the head's own mutation ID, or of
/// the snapshot's `last_mutation_id` when the head is a snapshot.
pub fn next_mutation_id(store: &dyn ContentStore, head: &Hash) -> DbResult<u64> {
    let commit = Commit::read(store, head)?;
    match commit.meta {
        CommitMeta::Snapshot {
            last_mutation_id, ..
        } => Ok(last_mutation_id + 1),
        CommitMeta::Tx { mutation_id, .. } => Ok(mutation_id + 1),
        CommitMeta::Reorder { .. } => {
            let (_, target) = final_reorder_target(store, head)?;
            match target.meta {
                CommitMeta::Tx { mutation_id, .. } => Ok(mutation_id + 1),
                _ => Err(DbError::corrupt(format!(
                    "reorder {head} does not target a tx"
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riptide_kv::Map;
    use riptide_store::MemoryStore;
    use serde_json::json;

    fn write_map(store: &dyn ContentStore, map: &Map) -> (Hash, String) {
        let chunk = map.to_chunk().unwrap();
        (store.put(chunk).unwrap(), map.checksum().to_string())
    }

    fn snapshot(
        store: &dyn ContentStore,
        basis: Option<Hash>,
        state_id: &str,
        last_mutation_id: u64,
        map: &Map,
    ) -> Hash {
        let (data, checksum) = write_map(store, map);
        Commit {
            basis,
            data,
            checksum,
            meta: CommitMeta::Snapshot {
                server_state_id: state_id.into(),
                last_mutation_id,
            },
        }
        .write(store)
        .unwrap()
    }

    fn tx(
        store: &dyn ContentStore,
        basis: Hash,
        mutation_id: u64,
        name: &str,
        args: Value,
        map: &Map,
    ) -> Hash {
        let (data, checksum) = write_map(store, map);
        Commit {
            basis: Some(basis),
            data,
            checksum,
            meta: CommitMeta::Tx {
                mutator_name: name.into(),
                mutator_args: args,
                mutation_id,
                origin_client_id: "client".into(),
                bundle: None,
            },
        }
        .write(store)
        .unwrap()
    }

    #[test]
    fn hash_is_deterministic_and_field_sensitive() {
        let store = MemoryStore::new();
        let map = Map::new();
        let h1 = snapshot(&store, None, "s1", 0, &map);
        let h2 = snapshot(&store, None, "s1", 0, &map);
        assert_eq!(h1, h2);

        let h3 = snapshot(&store, None, "s1", 1, &map);
        assert_ne!(h1, h3);
        let h4 = snapshot(&store, None, "s2", 0, &map);
        assert_ne!(h1, h4);
    }

    #[test]
    fn read_round_trips() {
        let store = MemoryStore::new();
        let mut map = Map::new();
        map.put("k".into(), json!(1));
        let genesis = snapshot(&store, None, "", 0, &Map::new());
        let h = tx(&store, genesis, 1, "setK", json!({"k": 1}), &map);

        let commit = Commit::read(&store, &h).unwrap();
        assert_eq!(commit.basis, Some(genesis));
        assert!(matches!(commit.meta, CommitMeta::Tx { mutation_id: 1, .. }));
        assert_eq!(commit.load_map(&store).unwrap(), map);
    }

    #[test]
    fn load_map_detects_checksum_divergence() {
        let store = MemoryStore::new();
        let mut map = Map::new();
        map.put("k".into(), json!(1));
        let (data, _) = write_map(&store, &map);
        let h = Commit {
            basis: None,
            data,
            checksum: "0000000000000bad".into(),
            meta: CommitMeta::Snapshot {
                server_state_id: String::new(),
                last_mutation_id: 0,
            },
        }
        .write(&store)
        .unwrap();

        let commit = Commit::read(&store, &h).unwrap();
        assert!(matches!(
            commit.load_map(&store),
            Err(DbError::Corrupt { .. })
        ));
    }

    #[test]
    fn base_snapshot_walks_to_nearest_snapshot() {
        let store = MemoryStore::new();
        let map = Map::new();
        let genesis = snapshot(&store, None, "", 0, &map);
        let t1 = tx(&store, genesis, 1, "a", json!(null), &map);
        let t2 = tx(&store, t1, 2, "b", json!(null), &map);

        let (h, c) = base_snapshot(&store, &t2).unwrap();
        assert_eq!(h, genesis);
        assert!(c.is_snapshot());

        // A snapshot is its own base.
        let (h, _) = base_snapshot(&store, &genesis).unwrap();
        assert_eq!(h, genesis);
    }

    #[test]
    fn base_snapshot_fails_on_chain_without_snapshot() {
        let store = MemoryStore::new();
        let map = Map::new();
        // A tx with no basis violates the root-is-a-snapshot invariant.
        let (data, checksum) = write_map(&store, &map);
        let orphan = Commit {
            basis: None,
            data,
            checksum,
            meta: CommitMeta::Tx {
                mutator_name: "x".into(),
                mutator_args: json!(null),
                mutation_id: 1,
                origin_client_id: "client".into(),
                bundle: None,
            },
        }
        .write(&store)
        .unwrap();

        assert!(matches!(
            base_snapshot(&store, &orphan),
            Err(DbError::Corrupt { .. })
        ));
    }

    #[test]
    fn final_reorder_target_unwraps_chains() {
        let store = MemoryStore::new();
        let map = Map::new();
        let genesis = snapshot(&store, None, "", 0, &map);
        let t1 = tx(&store, genesis, 1, "orig", json!(7), &map);

        let (data, checksum) = write_map(&store, &map);
        let r1 = Commit {
            basis: Some(genesis),
            data,
            checksum: checksum.clone(),
            meta: CommitMeta::Reorder { original: t1 },
        }
        .write(&store)
        .unwrap();
        let r2 = Commit {
            basis: Some(genesis),
            data,
            checksum,
            meta: CommitMeta::Reorder { original: r1 },
        }
        .write(&store)
        .unwrap();

        let (h, target) = final_reorder_target(&store, &r2).unwrap();
        assert_eq!(h, t1);
        assert!(matches!(
            target.meta,
            CommitMeta::Tx { ref mutator_name, .. } if mutator_name == "orig"
        ));
    }

    #[test]
    fn pending_walks_oldest_first_and_filters_applied() {
        let store = MemoryStore::new();
        let map = Map::new();
        // Snapshot says the server has applied up through mutation 1.
        let snap = snapshot(&store, None, "s1", 1, &map);
        let t2 = tx(&store, snap, 2, "second", json!(2), &map);
        let t3 = tx(&store, t2, 3, "third", json!(3), &map);

        let pending = pending_mutations(&store, &t3).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].mutation_id, 2);
        assert_eq!(pending[0].name, "second");
        assert_eq!(pending[1].mutation_id, 3);
    }

    #[test]
    fn pending_is_empty_at_a_snapshot() {
        let store = MemoryStore::new();
        let snap = snapshot(&store, None, "s1", 5, &Map::new());
        assert!(pending_mutations(&store, &snap).unwrap().is_empty());
    }

    #[test]
    fn next_mutation_id_is_gapless() {
        let store = MemoryStore::new();
        let map = Map::new();
        let snap = snapshot(&store, None, "s1", 4, &map);
        assert_eq!(next_mutation_id(&store, &snap).unwrap(), 5);

        let t5 = tx(&store, snap, 5, "m", json!(null), &map);
        assert_eq!(next_mutation_id(&store, &t5).unwrap(), 6);
    }

    proptest::proptest! {
        #[test]
        fn encoding_is_deterministic_across_logical_copies(
            state_id in "[a-z0-9]{0,12}",
            last_mutation_id in 0u64..1_000_000,
        ) {
            let store = MemoryStore::new();
            let map = Map::new();
            let h1 = snapshot(&store, None, &state_id, last_mutation_id, &map);
            let h2 = snapshot(&store, None, &state_id, last_mutation_id, &map);
            proptest::prop_assert_eq!(h1, h2);

            // Any field change moves the hash.
            let h3 = snapshot(&store, None, &state_id, last_mutation_id + 1, &map);
            proptest::prop_assert_ne!(h1, h3);
        }
    }
}
