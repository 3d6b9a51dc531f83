//! # Riptide Testkit
//!
//! Test fixtures for Riptide.
//!
//! The centerpiece is [`FakeServer`], an in-process data layer plus
//! diff view: it accepts mutation batches the way a batch endpoint
//! does, serves full-reset diffs the way a diff service does, and lets
//! tests mutate server state behind the client's back. Integration
//! tests adapt it to the sync engine's `HttpClient` trait with a few
//! lines of routing.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod server;

pub use server::{FakeServer, ServerMutatorFn};

use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Installs a test-friendly tracing subscriber, once per process.
///
/// Honors `RUST_LOG`; silent by default. Safe to call from every test.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
