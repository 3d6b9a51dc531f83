//! Replaying local history onto a freshly pulled snapshot.

use crate::error::{SyncError, SyncResult};
use crate::mutator::MutatorRegistry;
use riptide_db::{base_snapshot, final_reorder_target, Commit, CommitMeta, DbError};
use riptide_store::{ContentStore, Hash};
use std::collections::HashSet;
use tracing::debug;

/// Rebases `head` onto `onto`, returning the new tip.
///
/// After a pull the store holds two children of the same fork point:
/// the local history and the new snapshot. History is never rewritten -
/// the old fork stays in the store for forensics - so reconciliation
/// builds a new, parallel, linear history on top of the snapshot:
///
/// - a local commit already reachable from `onto` needs no work
/// - a commit whose basis is unchanged is reused as-is (fast-forward)
/// - anything else is replayed through the mutator registry, producing
///   a Reorder commit whose basis is the rebased predecessor
///
/// A mutation the snapshot already covers (`mutation_id` at or below
/// the snapshot's `lastMutationID`) was applied server-side; replaying
/// it would double-apply, so its frame resolves to the rebased basis.
///
/// The walk is an explicit frame loop rather than recursion so a long
/// offline period with many pending mutations cannot exhaust the
/// stack. Ancestry of `onto` is precomputed as a hash set, keeping the
/// whole rebase linear in chain length.
///
/// Only Tx and Reorder commits are replayable; any other type above
/// the fork point means the DAG has an impossible shape, and the
/// rebase halts with [`SyncError::UnsupportedCommitType`].
pub fn rebase(
    store: &dyn ContentStore,
    registry: &dyn MutatorRegistry,
    head: &Hash,
    onto: &Hash,
) -> SyncResult<Hash> {
    let mut ancestors = HashSet::new();
    let mut cursor = Some(*onto);
    while let Some(hash) = cursor {
        ancestors.insert(hash);
        cursor = Commit::read(store, &hash)?.basis;
    }

    // Collect the local commits above the fork point, newest first.
    let mut frames: Vec<(Hash, Commit)> = Vec::new();
    let mut cursor = *head;
    while !ancestors.contains(&cursor) {
        let commit = Commit::read(store, &cursor)?;
        let basis = commit.basis;
        frames.push((cursor, commit));
        match basis {
            Some(b) => cursor = b,
            None => {
                return Err(SyncError::Db(DbError::corrupt(format!(
                    "no common ancestor between {head} and {onto}"
                ))))
            }
        }
    }

    let (_, onto_snapshot) = base_snapshot(store, onto)?;
    let applied_through = onto_snapshot.last_mutation_id().unwrap_or(0);

    let mut new_basis = *onto;
    for (hash, commit) in frames.into_iter().rev() {
        let old_basis = match commit.basis {
            Some(b) => b,
            None => {
                return Err(SyncError::Db(DbError::corrupt(format!(
                    "commit {hash} above the fork point has no basis"
                ))))
            }
        };

        // Nothing changed below this commit: fast-forward.
        if old_basis == new_basis {
            new_basis = hash;
            continue;
        }

        if commit.is_snapshot() {
            return Err(SyncError::UnsupportedCommitType {
                commit: hash,
                kind: commit.type_name(),
            });
        }

        let (_, target) = final_reorder_target(store, &hash)?;
        let (name, args, mutation_id) = match target.meta {
            CommitMeta::Tx {
                mutator_name,
                mutator_args,
                mutation_id,
                ..
            } => (mutator_name, mutator_args, mutation_id),
            _ => {
                return Err(SyncError::Db(DbError::corrupt(format!(
                    "reorder target of {hash} is not a tx"
                ))))
            }
        };

        if mutation_id <= applied_through {
            debug!(commit = %hash, mutation_id, "skipping replay of server-applied mutation");
            continue;
        }

        let basis_commit = Commit::read(store, &new_basis)?;
        let mut map = basis_commit.load_map(store)?;
        registry.replay(&name, &args, &mut map)?;

        let data = store.put(map.to_chunk()?)?;
        let reorder = Commit {
            basis: Some(new_basis),
            data,
            checksum: map.checksum().to_string(),
            meta: CommitMeta::Reorder { original: hash },
        }
        .write(store)?;
        debug!(original = %hash, reorder = %reorder, mutation_id, "replayed");
        new_basis = reorder;
    }

    Ok(new_basis)
}
