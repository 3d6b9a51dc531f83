//! Pull endpoint request and response bodies.

use riptide_kv::PatchOp;
use serde::{Deserialize, Serialize};

/// Body of a pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    /// Auth token the diff service forwards to the data layer.
    pub client_view_auth: String,
    /// The requesting client.
    #[serde(rename = "clientID")]
    pub client_id: String,
    /// Server state token the client's base snapshot corresponds to.
    /// Empty for a client that has never pulled.
    #[serde(rename = "baseStateID")]
    pub base_state_id: String,
    /// Checksum of the client's base map, so the server can verify the
    /// diff it computes applies cleanly.
    pub checksum: String,
}

/// Body of a pull response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    /// Operations that transform the base map into the new state.
    #[serde(default)]
    pub patch: Vec<PatchOp>,
    /// Token identifying the new server state.
    #[serde(rename = "stateID")]
    pub state_id: String,
    /// Highest mutation ID the server has applied for this client.
    #[serde(rename = "lastMutationID")]
    pub last_mutation_id: u64,
    /// Checksum the patched map must have.
    pub checksum: String,
    /// Diagnostics about the server's fetch of the client view.
    #[serde(default)]
    pub client_view_info: ClientViewInfo,
}

/// Server-reported metadata about a pull, for observability only.
///
/// Nothing in here participates in correctness decisions; it is carried
/// back to the caller so it can be logged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientViewInfo {
    /// Status the data layer returned to the diff service.
    #[serde(default)]
    pub http_status_code: u16,
    /// Error message from the data layer, if any.
    #[serde(default)]
    pub error_message: String,
}
