//! # Riptide Dispatch
//!
//! The JSON dispatch surface Riptide exposes to its host RPC layer.
//!
//! Hosts (mobile bindings, browser bridges, test drivers) speak to a
//! database through [`Registry::dispatch`]: a database name, an RPC
//! name, and a JSON request body in; a JSON response body out. The
//! registry owns the set of open databases - its lifecycle belongs to
//! the hosting application, constructed at startup and torn down with
//! [`Registry::shutdown`]; there is no process-wide singleton.
//!
//! A panic inside a handler is caught at the dispatch boundary and
//! converted into an error for that call, so one database's fault
//! cannot take down a multi-database process.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod connection;
mod error;
mod registry;
pub mod rpc;

pub use error::{DispatchError, DispatchResult};
pub use registry::{MemoryStoreProvider, Registry, StoreProvider};
