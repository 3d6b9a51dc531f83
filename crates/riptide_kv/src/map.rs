//! Ordered key-value map with an incrementally maintained checksum.

use crate::checksum::Checksum;
use crate::error::KvResult;
use serde_json::Value;
use std::collections::BTreeMap;

/// An ordered map from string keys to JSON values.
///
/// The map maintains its [`Checksum`] incrementally: every put and del
/// adjusts the digest without rehashing the other entries. Cloning is
/// O(n) and is how transactions take their working copy of the head's
/// state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Map {
    entries: BTreeMap<String, Value>,
    checksum: Checksum,
}

/// Options controlling a [`Map::scan`].
///
/// Scans are stateless: a fresh call re-scans from scratch, so callers
/// can restart at any time without server-side cursor bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Only keys with this prefix are returned.
    pub prefix: Option<String>,
    /// Scanning starts at this key (inclusive).
    pub start_key: Option<String>,
    /// At most this many entries are returned.
    pub limit: Option<usize>,
}

impl Map {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts or replaces a value.
    pub fn put(&mut self, key: String, value: Value) {
        if let Some(old) = self.entries.get(&key) {
            self.checksum.remove(&key, old);
        }
        self.checksum.add(&key, &value);
        self.entries.insert(key, value);
    }

    /// Removes a key. Returns true if it was present.
    pub fn del(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(old) => {
                self.checksum.remove(key, &old);
                true
            }
            None => false,
        }
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.checksum = Checksum::empty();
    }

    /// Returns entries in key order, subject to `options`.
    #[must_use]
    pub fn scan(&self, options: &ScanOptions) -> Vec<(String, Value)> {
        let limit = options.limit.unwrap_or(usize::MAX);
        self.entries
            .iter()
            .skip_while(|(k, _)| match &options.start_key {
                Some(start) => k.as_str() < start.as_str(),
                None => false,
            })
            .filter(|(k, _)| match &options.prefix {
                Some(prefix) => k.starts_with(prefix.as_str()),
                None => true,
            })
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Returns the current checksum.
    #[must_use]
    pub fn checksum(&self) -> Checksum {
        self.checksum
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Serializes the map to a chunk.
    ///
    /// The encoding is a JSON object in key order, so equal maps always
    /// produce identical chunks (and therefore identical content hashes).
    pub fn to_chunk(&self) -> KvResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.entries)?)
    }

    /// Deserializes a map from a chunk, rebuilding its checksum.
    pub fn from_chunk(bytes: &[u8]) -> KvResult<Self> {
        let entries: BTreeMap<String, Value> = serde_json::from_slice(bytes)?;
        let mut checksum = Checksum::empty();
        for (k, v) in &entries {
            checksum.add(k, v);
        }
        Ok(Self { entries, checksum })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn put_get_del() {
        let mut m = Map::new();
        m.put("k".into(), json!("v"));
        assert_eq!(m.get("k"), Some(&json!("v")));
        assert!(m.has("k"));
        assert!(m.del("k"));
        assert!(!m.has("k"));
        assert!(!m.del("k"));
    }

    #[test]
    fn checksum_tracks_contents() {
        let mut m = Map::new();
        assert_eq!(m.checksum(), Checksum::empty());

        m.put("a".into(), json!(1));
        let with_a = m.checksum();

        m.put("b".into(), json!(2));
        m.del("b");
        assert_eq!(m.checksum(), with_a);

        m.del("a");
        assert_eq!(m.checksum(), Checksum::empty());
    }

    #[test]
    fn overwrite_updates_checksum() {
        let mut m1 = Map::new();
        m1.put("k".into(), json!("old"));
        m1.put("k".into(), json!("new"));

        let mut m2 = Map::new();
        m2.put("k".into(), json!("new"));

        assert_eq!(m1.checksum(), m2.checksum());
    }

    #[test]
    fn scan_in_key_order() {
        let mut m = Map::new();
        m.put("b".into(), json!(2));
        m.put("a".into(), json!(1));
        m.put("c".into(), json!(3));

        let all = m.scan(&ScanOptions::default());
        let keys: Vec<_> = all.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn scan_with_prefix() {
        let mut m = Map::new();
        m.put("user/1".into(), json!(1));
        m.put("user/2".into(), json!(2));
        m.put("post/1".into(), json!(3));

        let users = m.scan(&ScanOptions {
            prefix: Some("user/".into()),
            ..Default::default()
        });
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].0, "user/1");
    }

    #[test]
    fn scan_with_start_and_limit() {
        let mut m = Map::new();
        for k in ["a", "b", "c", "d"] {
            m.put(k.into(), json!(null));
        }

        let got = m.scan(&ScanOptions {
            start_key: Some("b".into()),
            limit: Some(2),
            ..Default::default()
        });
        let keys: Vec<_> = got.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn chunk_round_trip() {
        let mut m = Map::new();
        m.put("k".into(), json!({"nested": [1, 2, 3]}));
        m.put("other".into(), json!(true));

        let chunk = m.to_chunk().unwrap();
        let back = Map::from_chunk(&chunk).unwrap();
        assert_eq!(m, back);
        assert_eq!(m.checksum(), back.checksum());
    }

    #[test]
    fn equal_maps_equal_chunks() {
        let mut m1 = Map::new();
        m1.put("b".into(), json!(2));
        m1.put("a".into(), json!(1));

        let mut m2 = Map::new();
        m2.put("a".into(), json!(1));
        m2.put("b".into(), json!(2));

        assert_eq!(m1.to_chunk().unwrap(), m2.to_chunk().unwrap());
    }

    proptest! {
        #[test]
        fn checksum_matches_rebuild(ops in proptest::collection::vec(
            (any::<bool>(), "[a-c]{1,2}", 0u32..100), 0..40)
        ) {
            let mut m = Map::new();
            for (is_put, key, v) in ops {
                if is_put {
                    m.put(key, json!(v));
                } else {
                    m.del(&key);
                }
            }
            // The incrementally maintained digest must equal one rebuilt
            // from scratch over the final contents.
            let rebuilt = Map::from_chunk(&m.to_chunk().unwrap()).unwrap();
            prop_assert_eq!(m.checksum(), rebuilt.checksum());
        }
    }
}
