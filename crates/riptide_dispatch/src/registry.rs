//! The registry of open databases and the dispatch entry point.

use crate::connection::Connection;
use crate::error::{DispatchError, DispatchResult};
use crate::rpc;
use parking_lot::{Mutex, RwLock};
use riptide_db::Database;
use riptide_store::{ContentStore, MemoryStore, StoreResult};
use riptide_sync::{HttpClient, MutatorRegistry};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Resolves database names to content stores.
///
/// The host decides where databases live (platform key-value storage,
/// browser storage, memory). `open` is called once per database name
/// while it is open; `destroy` removes its backing storage.
pub trait StoreProvider: Send + Sync {
    /// Opens (creating if needed) the store for `name`.
    fn open(&self, name: &str) -> StoreResult<Arc<dyn ContentStore>>;

    /// Deletes the backing storage for `name`.
    fn destroy(&self, name: &str) -> StoreResult<()>;
}

/// A provider that keeps every database in memory.
///
/// Stores survive close/reopen for the lifetime of the provider, which
/// is what tests and ephemeral hosts want.
#[derive(Default)]
pub struct MemoryStoreProvider {
    stores: Mutex<HashMap<String, Arc<MemoryStore>>>,
}

impl MemoryStoreProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreProvider for MemoryStoreProvider {
    fn open(&self, name: &str) -> StoreResult<Arc<dyn ContentStore>> {
        let mut stores = self.stores.lock();
        let store = stores
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryStore::new()));
        Ok(Arc::clone(store) as Arc<dyn ContentStore>)
    }

    fn destroy(&self, name: &str) -> StoreResult<()> {
        self.stores.lock().remove(name);
        Ok(())
    }
}

/// The set of open databases and the JSON dispatch entry point.
///
/// One registry per hosting application. Construct it at startup with
/// the host's store provider, HTTP client, and mutator registry;
/// inject it into the RPC layer; call [`Registry::shutdown`] at
/// teardown to release every handle.
pub struct Registry<C: HttpClient> {
    provider: Box<dyn StoreProvider>,
    client: Arc<C>,
    mutators: Arc<dyn MutatorRegistry>,
    connections: RwLock<HashMap<String, Arc<Connection<C>>>>,
    // Request counter for log correlation.
    rid: AtomicU64,
}

impl<C: HttpClient> Registry<C> {
    /// Creates a registry.
    pub fn new(
        provider: Box<dyn StoreProvider>,
        client: Arc<C>,
        mutators: Arc<dyn MutatorRegistry>,
    ) -> Self {
        Self {
            provider,
            client,
            mutators,
            connections: RwLock::new(HashMap::new()),
            rid: AtomicU64::new(0),
        }
    }

    /// Sends an API request to a database and returns the JSON response.
    ///
    /// The `open`, `close`, `drop`, and `list` RPCs manage the registry
    /// itself; everything else requires `db_name` to be open. A panic
    /// inside a handler is contained and surfaced as
    /// [`DispatchError::Internal`] for this call only.
    pub fn dispatch(&self, db_name: &str, rpc: &str, data: &[u8]) -> DispatchResult<Vec<u8>> {
        let rid = self.rid.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(db = db_name, req = rpc, rid, "rpc -->");

        let result = catch_unwind(AssertUnwindSafe(|| self.dispatch_inner(db_name, rpc, data)))
            .unwrap_or_else(|panic| {
                let msg = panic_message(&panic);
                error!(db = db_name, req = rpc, rid, message = %msg, "handler panicked");
                Err(DispatchError::Internal(msg))
            });

        match &result {
            Ok(_) => debug!(db = db_name, req = rpc, rid, "rpc <--"),
            Err(e) => debug!(db = db_name, req = rpc, rid, error = %e, "rpc <-- failed"),
        }
        result
    }

    fn dispatch_inner(&self, db_name: &str, rpc: &str, data: &[u8]) -> DispatchResult<Vec<u8>> {
        match rpc {
            "list" => return encode(&self.list()),
            "open" => {
                self.open(db_name)?;
                return Ok(Vec::new());
            }
            "close" => {
                self.close(db_name)?;
                return Ok(Vec::new());
            }
            "drop" => {
                self.drop_database(db_name)?;
                return Ok(Vec::new());
            }
            _ => {}
        }

        let conn = self
            .connections
            .read()
            .get(db_name)
            .cloned()
            .ok_or(DispatchError::DatabaseNotOpen)?;

        match rpc {
            "getRoot" => encode(&conn.get_root()?),
            "has" => encode(&conn.has(decode(data)?)?),
            "get" => encode(&conn.get(decode(data)?)?),
            "scan" => encode(&conn.scan(decode(data)?)?),
            "put" => encode(&conn.put(decode(data)?)?),
            "del" => encode(&conn.del(decode(data)?)?),
            "openTransaction" => encode(&conn.open_transaction(decode(data)?)?),
            "closeTransaction" => encode(&conn.close_transaction(decode(data)?)?),
            "commitTransaction" => encode(&conn.commit_transaction(decode(data)?)?),
            "beginSync" => encode(&conn.begin_sync(decode(data)?)?),
            "maybeEndSync" => encode(&conn.maybe_end_sync(decode(data)?)?),
            other => Err(DispatchError::UnknownRpc(other.to_string())),
        }
    }

    /// Opens a database. Opening an already-open database is a no-op.
    pub fn open(&self, db_name: &str) -> DispatchResult<()> {
        if db_name.is_empty() {
            return Err(DispatchError::EmptyDatabaseName);
        }
        let mut connections = self.connections.write();
        if connections.contains_key(db_name) {
            return Ok(());
        }
        let store = self.provider.open(db_name)?;
        let db = Database::open(store)?;
        let conn = Connection::new(db, Arc::clone(&self.client), Arc::clone(&self.mutators));
        info!(db = db_name, client_id = %conn.client_id(), "opened database");
        connections.insert(db_name.to_string(), Arc::new(conn));
        Ok(())
    }

    /// Releases the resources held by an open database.
    pub fn close(&self, db_name: &str) -> DispatchResult<()> {
        if db_name.is_empty() {
            return Err(DispatchError::EmptyDatabaseName);
        }
        self.connections.write().remove(db_name);
        Ok(())
    }

    /// Closes a database and deletes its backing storage.
    pub fn drop_database(&self, db_name: &str) -> DispatchResult<()> {
        self.close(db_name)?;
        self.provider.destroy(db_name)?;
        Ok(())
    }

    /// Lists open databases in name order.
    pub fn list(&self) -> rpc::ListResponse {
        let mut names: Vec<_> = self.connections.read().keys().cloned().collect();
        names.sort();
        rpc::ListResponse {
            databases: names
                .into_iter()
                .map(|name| rpc::DatabaseInfo { name })
                .collect(),
        }
    }

    /// Releases every open database.
    pub fn shutdown(&self) {
        self.connections.write().clear();
    }
}

fn decode<T: serde::de::DeserializeOwned>(data: &[u8]) -> DispatchResult<T> {
    Ok(serde_json::from_slice(data)?)
}

fn encode<T: serde::Serialize>(value: &T) -> DispatchResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
