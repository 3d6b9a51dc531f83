//! In-process fake data layer and diff view.

use parking_lot::Mutex;
use riptide_kv::{Map, PatchOp};
use riptide_protocol::{
    BatchPushRequest, BatchPushResponse, MutationInfo, PullRequest, PullResponse,
};
use serde_json::Value;
use std::collections::HashMap;

/// A server-side mutator implementation.
pub type ServerMutatorFn = Box<dyn Fn(&mut Map, &Value) -> Result<(), String> + Send + Sync>;

#[derive(Default)]
struct ClientStore {
    last_mutation_id: u64,
    data: Map,
    version: u64,
}

impl ClientStore {
    fn state_id(&self) -> String {
        format!("s{}", self.version)
    }
}

/// An in-process stand-in for the batch push endpoint and the diff
/// service, one logical store per client ID.
///
/// Mutations whose ID the server has already seen are skipped and
/// reported in the push response, mirroring how a real data layer
/// keeps mutations idempotent. Pulls serve a full-reset diff (clear
/// plus one put per entry), which applies cleanly to any base and
/// always matches the declared checksum.
#[derive(Default)]
pub struct FakeServer {
    stores: Mutex<HashMap<String, ClientStore>>,
    mutators: Mutex<HashMap<String, ServerMutatorFn>>,
    auth_token: Mutex<Option<String>>,
}

impl FakeServer {
    /// Creates a server with no registered mutators and no auth.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires this auth token on every request.
    pub fn set_auth_token(&self, token: impl Into<String>) {
        *self.auth_token.lock() = Some(token.into());
    }

    /// Registers a server-side mutator.
    pub fn register_mutator(
        &self,
        name: impl Into<String>,
        mutator: impl Fn(&mut Map, &Value) -> Result<(), String> + Send + Sync + 'static,
    ) {
        self.mutators.lock().insert(name.into(), Box::new(mutator));
    }

    /// Changes a client's data behind its back, as another device would.
    pub fn change(&self, client_id: &str, key: impl Into<String>, value: Value) {
        let mut stores = self.stores.lock();
        let store = stores.entry(client_id.to_string()).or_default();
        store.data.put(key.into(), value);
        store.version += 1;
    }

    /// Returns the server's last applied mutation ID for a client.
    #[must_use]
    pub fn last_mutation_id(&self, client_id: &str) -> u64 {
        self.stores
            .lock()
            .get(client_id)
            .map(|s| s.last_mutation_id)
            .unwrap_or(0)
    }

    /// Returns the client IDs the server has stores for, in name order.
    #[must_use]
    pub fn client_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.stores.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns a copy of a client's server-side data.
    #[must_use]
    pub fn data(&self, client_id: &str) -> Map {
        self.stores
            .lock()
            .get(client_id)
            .map(|s| s.data.clone())
            .unwrap_or_default()
    }

    fn auth_ok(&self, provided: &str) -> bool {
        match self.auth_token.lock().as_deref() {
            Some(expected) => expected == provided,
            None => true,
        }
    }

    /// Handles a batch push request. Returns (status, body).
    pub fn handle_push(&self, auth: &str, body: &[u8]) -> (u16, Vec<u8>) {
        let req: BatchPushRequest = match serde_json::from_slice(body) {
            Ok(req) => req,
            Err(_) => return (400, Vec::new()),
        };
        if req.client_id.is_empty() {
            return (400, Vec::new());
        }
        if !self.auth_ok(auth) {
            return (401, Vec::new());
        }

        let mut stores = self.stores.lock();
        let store = stores.entry(req.client_id.clone()).or_default();
        let mutators = self.mutators.lock();

        let mut resp = BatchPushResponse::default();
        for m in &req.mutations {
            if m.id <= store.last_mutation_id {
                resp.mutation_infos.push(MutationInfo {
                    id: m.id,
                    error: format!(
                        "skipping this mutation: ID is not greater than {}",
                        store.last_mutation_id
                    ),
                });
                continue;
            }
            store.last_mutation_id = m.id;

            match mutators.get(&m.name) {
                Some(mutator) => match mutator(&mut store.data, &m.args) {
                    Ok(()) => store.version += 1,
                    Err(e) => resp.mutation_infos.push(MutationInfo {
                        id: m.id,
                        error: format!("skipping this mutation: {e}"),
                    }),
                },
                None => resp.mutation_infos.push(MutationInfo {
                    id: m.id,
                    error: format!("skipping this mutation: mutation {:?} not supported", m.name),
                }),
            }
        }

        match serde_json::to_vec(&resp) {
            Ok(body) => (200, body),
            Err(_) => (500, Vec::new()),
        }
    }

    /// Handles a pull request. Returns (status, body).
    pub fn handle_pull(&self, _auth: &str, body: &[u8]) -> (u16, Vec<u8>) {
        let req: PullRequest = match serde_json::from_slice(body) {
            Ok(req) => req,
            Err(_) => return (400, Vec::new()),
        };
        if req.client_id.is_empty() {
            return (400, Vec::new());
        }
        // The data-layer token rides in the pull body.
        if !self.auth_ok(&req.client_view_auth) {
            return (401, Vec::new());
        }

        let mut stores = self.stores.lock();
        let store = stores.entry(req.client_id.clone()).or_default();

        let patch = if req.base_state_id == store.state_id() {
            Vec::new()
        } else {
            let mut patch = vec![PatchOp::Clear];
            for (k, v) in store.data.iter() {
                patch.push(PatchOp::Put {
                    key: k.clone(),
                    value: v.clone(),
                });
            }
            patch
        };

        let resp = PullResponse {
            patch,
            state_id: store.state_id(),
            last_mutation_id: store.last_mutation_id,
            checksum: store.data.checksum().to_string(),
            client_view_info: Default::default(),
        };
        match serde_json::to_vec(&resp) {
            Ok(body) => (200, body),
            Err(_) => (500, Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riptide_protocol::Mutation;
    use serde_json::json;

    fn set_key_server() -> FakeServer {
        let server = FakeServer::new();
        server.register_mutator("setKey", |map, args| {
            let key = args["key"].as_str().ok_or("key must be a string")?;
            map.put(key.to_string(), args["value"].clone());
            Ok(())
        });
        server
    }

    fn push(server: &FakeServer, auth: &str, mutations: Vec<Mutation>) -> BatchPushResponse {
        let req = BatchPushRequest {
            client_id: "c1".into(),
            mutations,
        };
        let (status, body) = server.handle_push(auth, &serde_json::to_vec(&req).unwrap());
        assert_eq!(status, 200);
        serde_json::from_slice(&body).unwrap()
    }

    fn pull(server: &FakeServer, base_state_id: &str) -> PullResponse {
        let req = PullRequest {
            client_view_auth: "tok".into(),
            client_id: "c1".into(),
            base_state_id: base_state_id.into(),
            checksum: "0000000000000000".into(),
        };
        let (status, body) = server.handle_pull("", &serde_json::to_vec(&req).unwrap());
        assert_eq!(status, 200);
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn push_applies_mutations_in_order() {
        let server = set_key_server();
        let resp = push(
            &server,
            "",
            vec![
                Mutation {
                    id: 1,
                    name: "setKey".into(),
                    args: json!({"key": "k", "value": 1}),
                },
                Mutation {
                    id: 2,
                    name: "setKey".into(),
                    args: json!({"key": "k", "value": 2}),
                },
            ],
        );
        assert!(resp.mutation_infos.is_empty());
        assert_eq!(server.last_mutation_id("c1"), 2);
        assert_eq!(server.data("c1").get("k"), Some(&json!(2)));
    }

    #[test]
    fn stale_mutation_ids_are_skipped() {
        let server = set_key_server();
        push(
            &server,
            "",
            vec![Mutation {
                id: 5,
                name: "setKey".into(),
                args: json!({"key": "a", "value": 1}),
            }],
        );

        let resp = push(
            &server,
            "",
            vec![Mutation {
                id: 5,
                name: "setKey".into(),
                args: json!({"key": "a", "value": 99}),
            }],
        );
        assert_eq!(resp.mutation_infos.len(), 1);
        assert!(resp.mutation_infos[0].error.contains("skipping"));
        assert_eq!(server.data("c1").get("a"), Some(&json!(1)));
    }

    #[test]
    fn unknown_mutators_are_reported_not_fatal() {
        let server = set_key_server();
        let resp = push(
            &server,
            "",
            vec![Mutation {
                id: 1,
                name: "unknown".into(),
                args: json!(null),
            }],
        );
        assert_eq!(resp.mutation_infos.len(), 1);
        assert!(resp.mutation_infos[0].error.contains("not supported"));
    }

    #[test]
    fn pull_serves_full_reset_with_matching_checksum() {
        let server = set_key_server();
        server.change("c1", "k", json!("v"));

        let resp = pull(&server, "");
        assert_eq!(resp.patch[0], PatchOp::Clear);
        assert_eq!(resp.patch.len(), 2);
        assert_eq!(resp.checksum, server.data("c1").checksum().to_string());
        assert_eq!(resp.state_id, "s1");
    }

    #[test]
    fn pull_with_current_state_is_empty() {
        let server = set_key_server();
        server.change("c1", "k", json!("v"));

        let first = pull(&server, "");
        let second = pull(&server, &first.state_id);
        assert!(second.patch.is_empty());
        assert_eq!(second.state_id, first.state_id);
    }

    #[test]
    fn auth_is_enforced_when_set() {
        let server = set_key_server();
        server.set_auth_token("secret");

        let req = BatchPushRequest {
            client_id: "c1".into(),
            mutations: vec![],
        };
        let (status, _) = server.handle_push("wrong", &serde_json::to_vec(&req).unwrap());
        assert_eq!(status, 401);

        let (status, _) = server.handle_push("secret", &serde_json::to_vec(&req).unwrap());
        assert_eq!(status, 200);
    }
}
