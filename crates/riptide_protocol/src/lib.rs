//! # Riptide Protocol
//!
//! Wire types for the Riptide sync endpoints.
//!
//! Both endpoints are JSON over HTTP POST:
//! - the **pull** endpoint turns a base state and checksum into a diff
//!   against the server's current client view;
//! - the **push** endpoint accepts a batch of pending mutations.
//!
//! These records only describe the bodies. Transport, authentication
//! headers, and retry policy live in `riptide_sync`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod pull;
mod push;

pub use pull::{ClientViewInfo, PullRequest, PullResponse};
pub use push::{BatchPushInfo, BatchPushRequest, BatchPushResponse, Mutation, MutationInfo};
