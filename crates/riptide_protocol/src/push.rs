//! Push endpoint request and response bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a batch push request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPushRequest {
    /// The pushing client.
    pub client_id: String,
    /// Pending mutations in causal (oldest-first) order.
    pub mutations: Vec<Mutation>,
}

/// One mutation in a push batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    /// Per-client mutation ID, strictly increasing.
    pub id: u64,
    /// Mutator name.
    pub name: String,
    /// Mutator arguments, opaque to the protocol.
    pub args: Value,
}

/// Body of a successful batch push response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPushResponse {
    /// Per-mutation outcomes worth surfacing to the client's log.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mutation_infos: Vec<MutationInfo>,
}

/// Per-mutation outcome reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationInfo {
    /// The mutation this refers to.
    pub id: u64,
    /// Why the server skipped or rejected it.
    pub error: String,
}

/// Everything the client learned from one push attempt.
///
/// Push never fails fatally: transport errors, non-200 statuses, and
/// decode failures all land here as data for the caller to log. The
/// next pull's `lastMutationID` is what actually settles which
/// mutations the server applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPushInfo {
    /// HTTP status of the push request, or 0 if it never got a response.
    pub http_status_code: u16,
    /// Transport or server error message, if any.
    #[serde(default)]
    pub error_message: String,
    /// Decoded response body for a 200 status.
    #[serde(default)]
    pub batch_push_response: BatchPushResponse,
}
