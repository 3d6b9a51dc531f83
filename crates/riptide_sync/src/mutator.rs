//! Mutator registry used for rebase replay.

use crate::error::{SyncError, SyncResult};
use riptide_kv::Map;
use serde_json::Value;
use std::collections::HashMap;

/// Host-registered mutator implementations.
///
/// A Tx commit records only the mutator's name and arguments; the code
/// itself is the host application's. Replaying a mutation during rebase
/// therefore calls back into the host through this trait. The effect of
/// a replay must be the mutator's effect on the given map - nothing
/// else is consulted.
pub trait MutatorRegistry: Send + Sync {
    /// Applies the named mutator to `map` with `args`.
    ///
    /// # Errors
    ///
    /// [`SyncError::MutatorNotFound`] if the name is not registered;
    /// [`SyncError::MutatorFailed`] if the mutator itself rejects.
    fn replay(&self, name: &str, args: &Value, map: &mut Map) -> SyncResult<()>;
}

type MutatorFn = Box<dyn Fn(&mut Map, &Value) -> Result<(), String> + Send + Sync>;

/// A registry backed by plain closures.
#[derive(Default)]
pub struct FnMutatorRegistry {
    mutators: HashMap<String, MutatorFn>,
}

impl FnMutatorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mutator under `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        mutator: impl Fn(&mut Map, &Value) -> Result<(), String> + Send + Sync + 'static,
    ) {
        self.mutators.insert(name.into(), Box::new(mutator));
    }
}

impl MutatorRegistry for FnMutatorRegistry {
    fn replay(&self, name: &str, args: &Value, map: &mut Map) -> SyncResult<()> {
        let mutator = self
            .mutators
            .get(name)
            .ok_or_else(|| SyncError::MutatorNotFound(name.to_string()))?;
        mutator(map, args).map_err(|message| SyncError::MutatorFailed {
            name: name.to_string(),
            message,
        })
    }
}

impl std::fmt::Debug for FnMutatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnMutatorRegistry")
            .field("mutators", &self.mutators.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registered_mutator_runs() {
        let mut registry = FnMutatorRegistry::new();
        registry.register("setKey", |map, args| {
            let key = args["key"].as_str().ok_or("key must be a string")?;
            map.put(key.to_string(), args["value"].clone());
            Ok(())
        });

        let mut map = Map::new();
        registry
            .replay("setKey", &json!({"key": "k", "value": 1}), &mut map)
            .unwrap();
        assert_eq!(map.get("k"), Some(&json!(1)));
    }

    #[test]
    fn unknown_mutator_is_an_error() {
        let registry = FnMutatorRegistry::new();
        let mut map = Map::new();
        assert!(matches!(
            registry.replay("nope", &json!(null), &mut map),
            Err(SyncError::MutatorNotFound(_))
        ));
    }

    #[test]
    fn failing_mutator_reports_its_message() {
        let mut registry = FnMutatorRegistry::new();
        registry.register("explode", |_, _| Err("boom".into()));

        let mut map = Map::new();
        let err = registry.replay("explode", &json!(null), &mut map);
        assert!(matches!(
            err,
            Err(SyncError::MutatorFailed { ref message, .. }) if message == "boom"
        ));
    }
}
