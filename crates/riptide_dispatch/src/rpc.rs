//! Request and response records for the dispatch surface.
//!
//! Field names follow the wire convention of the sync endpoints:
//! camelCase, IDs spelled `ID`.

use riptide_store::Hash;
use riptide_sync::SyncInfo;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `openTransaction` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenTransactionRequest {
    /// Mutator name; empty or absent opens a read-only transaction.
    #[serde(default)]
    pub name: String,
    /// Mutator arguments.
    #[serde(default)]
    pub args: Value,
}

/// `openTransaction` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenTransactionResponse {
    /// Handle for subsequent data-plane calls.
    pub transaction_id: u64,
}

/// `has` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HasRequest {
    /// Transaction to read in.
    pub transaction_id: u64,
    /// Key to probe.
    pub key: String,
}

/// `has` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HasResponse {
    /// Whether the key is present.
    pub has: bool,
}

/// `get` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRequest {
    /// Transaction to read in.
    pub transaction_id: u64,
    /// Key to read.
    pub key: String,
}

/// `get` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetResponse {
    /// Whether the key is present.
    pub has: bool,
    /// The value, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// `scan` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    /// Transaction to read in.
    pub transaction_id: u64,
    /// Only keys with this prefix.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Start at this key (inclusive).
    #[serde(default)]
    pub start_key: Option<String>,
    /// At most this many items.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// One `scan` result entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanItem {
    /// Entry key.
    pub key: String,
    /// Entry value.
    pub value: Value,
}

/// `scan` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResponse {
    /// Matching entries in key order.
    pub items: Vec<ScanItem>,
}

/// `put` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutRequest {
    /// Transaction to write in.
    pub transaction_id: u64,
    /// Key to set.
    pub key: String,
    /// Value to store.
    pub value: Value,
}

/// `put` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PutResponse {}

/// `del` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelRequest {
    /// Transaction to write in.
    pub transaction_id: u64,
    /// Key to remove.
    pub key: String,
}

/// `del` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelResponse {
    /// Whether the key was present.
    pub ok: bool,
}

/// `closeTransaction` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTransactionRequest {
    /// Transaction to discard.
    pub transaction_id: u64,
}

/// `closeTransaction` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloseTransactionResponse {}

/// `commitTransaction` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitTransactionRequest {
    /// Transaction to seal.
    pub transaction_id: u64,
}

/// `commitTransaction` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitTransactionResponse {
    /// The new head commit.
    #[serde(rename = "ref")]
    pub commit_ref: Hash,
}

/// `getRoot` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRootResponse {
    /// The current head commit.
    pub root: Hash,
}

/// `beginSync` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginSyncRequest {
    /// Batch push endpoint URL.
    #[serde(rename = "batchPushURL")]
    pub batch_push_url: String,
    /// Diff endpoint URL.
    #[serde(rename = "diffServerURL")]
    pub diff_server_url: String,
    /// Data-layer auth token.
    pub data_layer_auth: String,
    /// Diff-service auth token.
    #[serde(default)]
    pub diff_server_auth: String,
}

/// `beginSync` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginSyncResponse {
    /// Candidate snapshot for `maybeEndSync`.
    pub sync_head: Hash,
    /// Push and pull diagnostics.
    pub sync_info: SyncInfo,
}

/// `maybeEndSync` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaybeEndSyncRequest {
    /// The candidate returned by `beginSync`.
    pub sync_head: Hash,
}

/// `maybeEndSync` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaybeEndSyncResponse {
    /// The promoted head.
    pub root: Hash,
}

/// One entry in the `list` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseInfo {
    /// Database name.
    pub name: String,
}

/// `list` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListResponse {
    /// Open databases, in name order.
    pub databases: Vec<DatabaseInfo>,
}
