//! Server-diff patch application.

use crate::error::{KvError, KvResult};
use crate::map::Map;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One operation in a server diff.
///
/// A pull response carries a sequence of these; applied in order to the
/// client's base map they reproduce the server's current view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PatchOp {
    /// Insert or replace a key.
    Put {
        /// The key to set.
        key: String,
        /// The new value.
        value: Value,
    },
    /// Remove a key. The key must exist in the base map.
    Del {
        /// The key to remove.
        key: String,
    },
    /// Remove every entry. Servers send this as the first operation of a
    /// full reset.
    Clear,
}

/// Applies a patch to `base`, producing a new map.
///
/// The base map is never modified; pull keeps it intact so a failed
/// patch or checksum mismatch leaves no trace.
///
/// # Errors
///
/// Returns [`KvError::InvalidPatch`] if a del targets a key the base map
/// does not contain - client and server disagree about the base state.
pub fn apply_patch(base: &Map, patch: &[PatchOp]) -> KvResult<Map> {
    let mut out = base.clone();
    for op in patch {
        match op {
            PatchOp::Put { key, value } => out.put(key.clone(), value.clone()),
            PatchOp::Del { key } => {
                if !out.del(key) {
                    return Err(KvError::invalid_patch(format!(
                        "del of missing key {key:?}"
                    )));
                }
            }
            PatchOp::Clear => out.clear(),
        }
    }
    Ok(out)
}
