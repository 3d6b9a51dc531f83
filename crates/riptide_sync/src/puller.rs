//! One pull round-trip against the client-view endpoint.

use crate::error::{SyncError, SyncResult};
use crate::transport::{HttpClient, DEFAULT_TIMEOUT};
use riptide_db::{Commit, CommitMeta, DbError};
use riptide_kv::{apply_patch, Checksum};
use riptide_protocol::{ClientViewInfo, PullRequest, PullResponse};
use riptide_store::{ContentStore, Hash};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// What a successful pull produced.
#[derive(Debug, Clone)]
pub struct PullOutcome {
    /// The new snapshot commit, persisted but not yet the head.
    pub snapshot: Hash,
    /// The server's last applied mutation ID as of the snapshot.
    pub last_mutation_id: u64,
    /// Server-reported diagnostics, for the caller's log only.
    pub client_view_info: ClientViewInfo,
}

/// Executes pull round-trips.
///
/// A pull turns "base snapshot + checksum" into a new snapshot commit.
/// Every failure path leaves the store's reachable state untouched: no
/// commit is written unless the patched map validated against the
/// server's declared checksum.
pub struct Puller<C: HttpClient> {
    client: Arc<C>,
    timeout: Duration,
}

impl<C: HttpClient> Puller<C> {
    /// Creates a puller with the default timeout.
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the request deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Pulls new server state via the diff endpoint.
    ///
    /// `base` must be the base snapshot of the current head. On success
    /// the new snapshot commit is written with `base` as its basis -
    /// the second child of the fork point that rebase reconciles.
    ///
    /// Validation order: mutation-ID regression, patch application,
    /// checksum parse, checksum comparison, state-ID progress. The
    /// first failure abandons the pull.
    #[allow(clippy::too_many_arguments)]
    pub fn pull(
        &self,
        store: &dyn ContentStore,
        base_hash: Hash,
        base: &Commit,
        url: &str,
        diff_server_auth: &str,
        client_view_auth: &str,
        client_id: &str,
    ) -> SyncResult<PullOutcome> {
        let base_state_id = base
            .server_state_id()
            .ok_or_else(|| DbError::corrupt(format!("pull base {base_hash} is not a snapshot")))?
            .to_string();
        let base_last_mutation_id = base.last_mutation_id().unwrap_or(0);
        let base_map = base.load_map(store)?;

        let request = PullRequest {
            client_view_auth: client_view_auth.to_string(),
            client_id: client_id.to_string(),
            base_state_id: base_state_id.clone(),
            checksum: base_map.checksum().to_string(),
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| SyncError::Protocol(format!("could not encode pull request: {e}")))?;
        debug!(url, base_state_id = %base_state_id, "pulling");

        let response = self.client.post(url, diff_server_auth, body, self.timeout)?;
        if response.status != 200 {
            return Err(SyncError::Server(format!(
                "status code {}: {}",
                response.status,
                String::from_utf8_lossy(&response.body)
            )));
        }

        let resp: PullResponse = serde_json::from_slice(&response.body).map_err(|e| {
            SyncError::Protocol(format!("response from {url} is not valid JSON: {e}"))
        })?;

        if resp.last_mutation_id < base_last_mutation_id {
            return Err(SyncError::Regression {
                got: resp.last_mutation_id,
                base: base_last_mutation_id,
            });
        }

        let patched = apply_patch(&base_map, &resp.patch)?;

        let expected: Checksum = resp
            .checksum
            .parse()
            .map_err(|_| SyncError::Protocol(format!("response checksum malformed: {}", resp.checksum)))?;
        if patched.checksum() != expected {
            warn!(
                expected = %expected,
                actual = %patched.checksum(),
                "pull checksum mismatch; client and server state have diverged"
            );
            return Err(SyncError::ChecksumMismatch {
                expected: expected.to_string(),
                actual: patched.checksum().to_string(),
            });
        }

        if resp.state_id == base_state_id {
            return Err(SyncError::NoProgress);
        }

        let data = store.put(patched.to_chunk()?)?;
        let snapshot = Commit {
            basis: Some(base_hash),
            data,
            checksum: patched.checksum().to_string(),
            meta: CommitMeta::Snapshot {
                server_state_id: resp.state_id,
                last_mutation_id: resp.last_mutation_id,
            },
        }
        .write(store)?;
        debug!(snapshot = %snapshot, last_mutation_id = resp.last_mutation_id, "pulled new snapshot");

        Ok(PullOutcome {
            snapshot,
            last_mutation_id: resp.last_mutation_id,
            client_view_info: resp.client_view_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpError, HttpResponse, MockHttpClient};
    use riptide_db::Database;
    use riptide_kv::{Map, PatchOp};
    use riptide_store::MemoryStore;
    use serde_json::json;

    fn setup() -> (Database, Arc<MockHttpClient>, Hash, Commit) {
        let db = Database::open(Arc::new(MemoryStore::new())).unwrap();
        let client = Arc::new(MockHttpClient::new());
        let head = db.head().unwrap();
        let base = Commit::read(db.store().as_ref(), &head).unwrap();
        (db, client, head, base)
    }

    fn do_pull(
        db: &Database,
        client: &Arc<MockHttpClient>,
        base_hash: Hash,
        base: &Commit,
    ) -> SyncResult<PullOutcome> {
        Puller::new(Arc::clone(client)).pull(
            db.store().as_ref(),
            base_hash,
            base,
            "http://diff/pull",
            "diff-auth",
            "view-auth",
            "client-1",
        )
    }

    #[test]
    fn successful_pull_writes_a_snapshot() {
        let (db, client, base_hash, base) = setup();

        let mut expected = Map::new();
        expected.put("a".into(), json!(1));
        client.enqueue_json(&riptide_protocol::PullResponse {
            patch: vec![PatchOp::Put {
                key: "a".into(),
                value: json!(1),
            }],
            state_id: "s1".into(),
            last_mutation_id: 0,
            checksum: expected.checksum().to_string(),
            client_view_info: Default::default(),
        });

        let outcome = do_pull(&db, &client, base_hash, &base).unwrap();
        assert_eq!(outcome.last_mutation_id, 0);
        let snapshot = Commit::read(db.store().as_ref(), &outcome.snapshot).unwrap();
        assert_eq!(snapshot.basis, Some(base_hash));
        assert_eq!(snapshot.server_state_id(), Some("s1"));
        assert_eq!(snapshot.load_map(db.store().as_ref()).unwrap(), expected);

        // Pull never moves the head itself.
        assert_eq!(db.head().unwrap(), base_hash);

        // The request carried the base state and checksum.
        let sent: riptide_protocol::PullRequest =
            serde_json::from_slice(&client.requests()[0].body).unwrap();
        assert_eq!(sent.base_state_id, "");
        assert_eq!(sent.client_id, "client-1");
    }

    #[test]
    fn regression_is_rejected_before_anything_is_written() {
        let (db, client, _, _) = setup();

        // Fabricate a base snapshot that has already seen mutation 5.
        let map = Map::new();
        let data = db.store().put(map.to_chunk().unwrap()).unwrap();
        let base = Commit {
            basis: Some(db.head().unwrap()),
            data,
            checksum: map.checksum().to_string(),
            meta: CommitMeta::Snapshot {
                server_state_id: "s5".into(),
                last_mutation_id: 5,
            },
        };
        let base_hash = base.write(db.store().as_ref()).unwrap();

        client.enqueue_json(&riptide_protocol::PullResponse {
            patch: vec![],
            state_id: "s6".into(),
            last_mutation_id: 3,
            checksum: map.checksum().to_string(),
            client_view_info: Default::default(),
        });

        assert!(matches!(
            do_pull(&db, &client, base_hash, &base),
            Err(SyncError::Regression { got: 3, base: 5 })
        ));
    }

    #[test]
    fn bogus_checksum_string_is_a_protocol_error() {
        let (db, client, base_hash, base) = setup();
        client.enqueue_json(&riptide_protocol::PullResponse {
            patch: vec![],
            state_id: "s1".into(),
            last_mutation_id: 0,
            checksum: "bogus".into(),
            client_view_info: Default::default(),
        });

        assert!(matches!(
            do_pull(&db, &client, base_hash, &base),
            Err(SyncError::Protocol(_))
        ));
    }

    #[test]
    fn checksum_mismatch_abandons_the_pull() {
        let (db, client, base_hash, base) = setup();
        let head_before = db.head().unwrap();

        client.enqueue_json(&riptide_protocol::PullResponse {
            patch: vec![PatchOp::Put {
                key: "a".into(),
                value: json!(1),
            }],
            state_id: "s1".into(),
            last_mutation_id: 0,
            // A well-formed checksum that cannot match the patched map.
            checksum: "00000000000000ff".into(),
            client_view_info: Default::default(),
        });

        assert!(matches!(
            do_pull(&db, &client, base_hash, &base),
            Err(SyncError::ChecksumMismatch { .. })
        ));
        assert_eq!(db.head().unwrap(), head_before);
    }

    #[test]
    fn unchanged_state_id_reports_no_progress() {
        let (db, client, base_hash, base) = setup();
        client.enqueue_json(&riptide_protocol::PullResponse {
            patch: vec![],
            state_id: String::new(), // same as the genesis base
            last_mutation_id: 0,
            checksum: Map::new().checksum().to_string(),
            client_view_info: Default::default(),
        });

        assert!(matches!(
            do_pull(&db, &client, base_hash, &base),
            Err(SyncError::NoProgress)
        ));
    }

    #[test]
    fn non_200_surfaces_the_body_verbatim() {
        let (db, client, base_hash, base) = setup();
        client.enqueue(Ok(HttpResponse::error(403, "bad auth token")));

        let err = do_pull(&db, &client, base_hash, &base);
        match err {
            Err(SyncError::Server(message)) => {
                assert!(message.contains("403"));
                assert!(message.contains("bad auth token"));
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn transport_failures_map_to_sync_errors() {
        let (db, client, base_hash, base) = setup();
        client.enqueue(Err(HttpError::Timeout));
        assert!(matches!(
            do_pull(&db, &client, base_hash, &base),
            Err(SyncError::Timeout)
        ));

        client.enqueue(Err(HttpError::Network("connection refused".into())));
        assert!(matches!(
            do_pull(&db, &client, base_hash, &base),
            Err(SyncError::Network(_))
        ));
    }

    #[test]
    fn garbage_body_is_a_protocol_error() {
        let (db, client, base_hash, base) = setup();
        client.enqueue(Ok(HttpResponse::ok(b"not json".to_vec())));
        assert!(matches!(
            do_pull(&db, &client, base_hash, &base),
            Err(SyncError::Protocol(_))
        ));
    }
}
