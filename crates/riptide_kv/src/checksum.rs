//! Order-independent incremental map checksum.

use crate::error::KvError;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// An order-independent digest over a map's key/value pairs.
///
/// Each pair contributes a fixed 64-bit term derived from a SHA-256 over
/// the length-prefixed key and the value's canonical JSON encoding. The
/// checksum is the wrapping sum of all terms, so adding or removing a
/// pair updates the digest in O(1) and insertion order never matters.
///
/// The string form is exactly sixteen lowercase hex digits; anything
/// else fails to parse. A server that declares a checksum the client
/// cannot parse is speaking a different protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checksum(u64);

impl Checksum {
    /// The checksum of an empty map.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Folds a key/value pair into the digest.
    pub fn add(&mut self, key: &str, value: &Value) {
        self.0 = self.0.wrapping_add(pair_term(key, value));
    }

    /// Removes a previously added key/value pair from the digest.
    ///
    /// The pair must have been added with exactly this key and value,
    /// otherwise the checksum silently diverges from the map contents.
    pub fn remove(&mut self, key: &str, value: &Value) {
        self.0 = self.0.wrapping_sub(pair_term(key, value));
    }
}

fn pair_term(key: &str, value: &Value) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update((key.len() as u64).to_le_bytes());
    hasher.update(key.as_bytes());
    // serde_json's compact encoding is canonical for values we store:
    // every value in a map was produced by serde_json in the first place.
    hasher.update(value.to_string().as_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[..8].try_into().unwrap())
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Checksum {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(KvError::MalformedChecksum(s.to_string()));
        }
        let v = u64::from_str_radix(s, 16).map_err(|_| KvError::MalformedChecksum(s.to_string()))?;
        Ok(Self(v))
    }
}
