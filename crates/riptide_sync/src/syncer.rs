//! Sync-cycle orchestration: `begin_sync` and `maybe_end_sync`.

use crate::error::{SyncError, SyncResult};
use crate::mutator::MutatorRegistry;
use crate::puller::Puller;
use crate::pusher::Pusher;
use crate::rebase::rebase;
use crate::transport::HttpClient;
use parking_lot::RwLock;
use riptide_db::{base_snapshot, pending_mutations, Database};
use riptide_protocol::{BatchPushInfo, ClientViewInfo};
use riptide_store::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Observable phase of the sync engine.
///
/// One cycle runs `Idle -> Pushing -> Pulling` inside `begin_sync` and
/// `Rebasing -> Promoted | Aborted` inside `maybe_end_sync`. Only one
/// cycle may be outstanding per database; the caller enforces that by
/// holding at most one sync-head candidate at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No cycle running.
    Idle,
    /// Sending pending mutations.
    Pushing,
    /// Fetching a new snapshot.
    Pulling,
    /// Replaying local history onto the candidate.
    Rebasing,
    /// The last cycle ended with the head advanced (or already current).
    Promoted,
    /// The last cycle failed.
    Aborted,
}

impl SyncPhase {
    /// Returns true while a call is actively working.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, SyncPhase::Pushing | SyncPhase::Pulling | SyncPhase::Rebasing)
    }

    /// Returns the phase's name, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Pushing => "pushing",
            SyncPhase::Pulling => "pulling",
            SyncPhase::Rebasing => "rebasing",
            SyncPhase::Promoted => "promoted",
            SyncPhase::Aborted => "aborted",
        }
    }
}

/// Endpoints and credentials for one sync cycle.
#[derive(Debug, Clone)]
pub struct BeginSyncRequest {
    /// Batch push endpoint URL.
    pub batch_push_url: String,
    /// Diff (client view) endpoint URL.
    pub diff_server_url: String,
    /// Auth token for the data layer, carried in the push header and
    /// the pull body.
    pub data_layer_auth: String,
    /// Auth token for the diff service, carried in the pull header.
    pub diff_server_auth: String,
}

/// Diagnostics collected during `begin_sync`, for the caller's log.
///
/// Serializable so the dispatch surface can hand it to hosts verbatim.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncInfo {
    /// Push outcome, absent when nothing was pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_push_info: Option<BatchPushInfo>,
    /// Server-reported client view metadata from the pull.
    #[serde(default)]
    pub client_view_info: ClientViewInfo,
}

/// What `begin_sync` hands back to the caller.
#[derive(Debug, Clone)]
pub struct BeginSyncResult {
    /// The candidate snapshot, to be passed to `maybe_end_sync`.
    pub sync_head: Hash,
    /// Observability data.
    pub sync_info: SyncInfo,
}

/// Orchestrates sync cycles for one database.
pub struct Syncer<C: HttpClient> {
    db: Database,
    pusher: Pusher<C>,
    puller: Puller<C>,
    registry: Arc<dyn MutatorRegistry>,
    phase: RwLock<SyncPhase>,
}

impl<C: HttpClient> Syncer<C> {
    /// Creates a syncer with default timeouts.
    pub fn new(db: Database, client: Arc<C>, registry: Arc<dyn MutatorRegistry>) -> Self {
        Self {
            db,
            pusher: Pusher::new(Arc::clone(&client)),
            puller: Puller::new(client),
            registry,
            phase: RwLock::new(SyncPhase::Idle),
        }
    }

    /// Overrides the request deadline for both round-trips.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.pusher = self.pusher.with_timeout(timeout);
        self.puller = self.puller.with_timeout(timeout);
        self
    }

    /// Returns the current phase.
    pub fn phase(&self) -> SyncPhase {
        *self.phase.read()
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.write() = phase;
    }

    fn enter(&self, phase: SyncPhase) -> SyncResult<()> {
        let mut current = self.phase.write();
        if current.is_active() {
            return Err(SyncError::CycleActive {
                phase: current.name(),
            });
        }
        *current = phase;
        Ok(())
    }

    fn abort<T>(&self, err: SyncError) -> SyncResult<T> {
        self.set_phase(SyncPhase::Aborted);
        Err(err)
    }

    /// Pushes pending mutations, pulls a new snapshot, and returns the
    /// snapshot as a sync-head candidate without touching the head.
    ///
    /// Push failure is not fatal - its outcome lands in
    /// [`SyncInfo::batch_push_info`] and the pull proceeds; the server
    /// may still have applied earlier pushes. A pull that reports no
    /// progress fails with [`SyncError::NoProgress`] and leaves no
    /// dangling candidate.
    pub fn begin_sync(&self, req: &BeginSyncRequest) -> SyncResult<BeginSyncResult> {
        self.enter(SyncPhase::Pushing)?;
        let store = self.db.store().as_ref();
        let head = match self.db.head() {
            Ok(head) => head,
            Err(e) => return self.abort(e.into()),
        };

        let mut sync_info = SyncInfo::default();
        let pending = match pending_mutations(store, &head) {
            Ok(pending) => pending,
            Err(e) => return self.abort(e.into()),
        };
        if !pending.is_empty() {
            let push_info = self.pusher.push(
                &pending,
                &req.batch_push_url,
                &req.data_layer_auth,
                self.db.client_id(),
            );
            if !push_info.error_message.is_empty() {
                info!(error = %push_info.error_message, "push did not complete");
            }
            sync_info.batch_push_info = Some(push_info);
        }

        self.set_phase(SyncPhase::Pulling);
        let (base_hash, base) = match base_snapshot(store, &head) {
            Ok(found) => found,
            Err(e) => return self.abort(e.into()),
        };
        let outcome = match self.puller.pull(
            store,
            base_hash,
            &base,
            &req.diff_server_url,
            &req.diff_server_auth,
            &req.data_layer_auth,
            self.db.client_id(),
        ) {
            Ok(outcome) => outcome,
            Err(e) => return self.abort(e),
        };
        sync_info.client_view_info = outcome.client_view_info.clone();

        self.set_phase(SyncPhase::Idle);
        debug!(sync_head = %outcome.snapshot, "begin_sync produced candidate");
        Ok(BeginSyncResult {
            sync_head: outcome.snapshot,
            sync_info,
        })
    }

    /// Rebases the current head onto `sync_head` and promotes the
    /// result.
    ///
    /// Local transactions may have committed since `begin_sync`; the
    /// rebase replays them onto the candidate. If yet another commit
    /// lands between the rebase and the promotion CAS, the whole call
    /// fails with `ConcurrentModification` rather than dropping the
    /// interleaved commit - callers retry from `begin_sync`.
    pub fn maybe_end_sync(&self, sync_head: &Hash) -> SyncResult<Hash> {
        self.enter(SyncPhase::Rebasing)?;
        let store = self.db.store().as_ref();

        let pre_sync_head = match self.db.head() {
            Ok(head) => head,
            Err(e) => return self.abort(e.into()),
        };
        let tip = match rebase(store, self.registry.as_ref(), &pre_sync_head, sync_head) {
            Ok(tip) => tip,
            Err(e) => return self.abort(e),
        };

        if tip != pre_sync_head {
            if let Err(e) = self.db.set_head(pre_sync_head, tip) {
                return self.abort(e.into());
            }
        }

        self.set_phase(SyncPhase::Promoted);
        info!(head = %tip, "sync cycle promoted");
        Ok(tip)
    }
}
