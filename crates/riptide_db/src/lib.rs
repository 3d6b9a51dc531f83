//! # Riptide DB
//!
//! Commit DAG and transaction manager for Riptide.
//!
//! This crate provides:
//! - The commit model: immutable, hash-addressed DAG nodes
//!   (snapshots, transactions, reorders) and basis-chain navigation
//! - The transaction manager: open/read/write/commit/close against an
//!   in-memory overlay of the head's map
//! - Head management: every head movement is a compare-and-swap against
//!   the content store's root pointer
//!
//! ## Key Invariants
//!
//! - Commits are created once and never mutated or deleted
//! - Exactly one local head exists per database at any time
//! - Mutation IDs are strictly increasing per client with no gaps
//!   relative to the last snapshot's `last_mutation_id`
//! - The basis chain of any reachable commit terminates in a snapshot

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod commit;
mod database;
mod error;
mod transaction;

pub use commit::{
    base_snapshot, final_reorder_target, next_mutation_id, pending_mutations, Commit, CommitMeta,
    PendingMutation,
};
pub use database::Database;
pub use error::{DbError, DbResult};
pub use transaction::{Transaction, TransactionState};
