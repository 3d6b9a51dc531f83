//! # Riptide Sync
//!
//! Pull, push, and rebase engine for Riptide.
//!
//! This crate provides:
//! - [`Pusher`] - delivers pending local mutations to the batch endpoint
//! - [`Puller`] - one pull round-trip producing a new snapshot commit
//! - [`rebase`] - replays unconfirmed local mutations onto a freshly
//!   pulled snapshot without rewriting the old history
//! - [`Syncer`] - the `begin_sync` / `maybe_end_sync` orchestration and
//!   its observable phase machine
//! - [`HttpClient`] - transport abstraction (trait + mock)
//!
//! ## Architecture
//!
//! A sync cycle is push, then pull, then rebase:
//! 1. `begin_sync` pushes whatever is pending, pulls a new snapshot, and
//!    hands the snapshot back as a candidate without touching the head
//! 2. local transactions may keep committing in the meantime
//! 3. `maybe_end_sync` rebases the current head onto the candidate and
//!    promotes the result with a single head compare-and-swap
//!
//! ## Key Invariants
//!
//! - Pull failures write nothing; the head and store are unchanged
//! - Push never fails fatally; its outcome is data for the caller's log
//! - Rebase preserves the forked history - replay creates new commits,
//!   it never rewrites or deletes old ones
//! - A lost head race during promotion fails the cycle; callers retry
//!   from `begin_sync`

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod mutator;
mod puller;
mod pusher;
mod rebase;
mod syncer;
mod transport;

pub use error::{SyncError, SyncResult};
pub use mutator::{FnMutatorRegistry, MutatorRegistry};
pub use puller::{PullOutcome, Puller};
pub use pusher::Pusher;
pub use rebase::rebase;
pub use syncer::{BeginSyncRequest, BeginSyncResult, SyncInfo, SyncPhase, Syncer};
pub use transport::{
    HttpClient, HttpError, HttpResponse, MockHttpClient, RecordedRequest, DEFAULT_TIMEOUT,
};
