//! # Riptide KV
//!
//! Checksummed ordered key-value map for Riptide.
//!
//! This crate provides:
//! - [`Map`] - an ordered key→value map over JSON values
//! - [`Checksum`] - an order-independent, incrementally maintained digest
//! - [`PatchOp`] / [`apply_patch`] - server-diff application
//! - [`ScanOptions`] - prefix/range/limit scans in key order
//!
//! ## Checksums
//!
//! Every map carries a checksum that is updated on each put/del without
//! rehashing the whole map. Two maps with equal contents have equal
//! checksums regardless of insertion order. The checksum is the system's
//! sole cheap divergence detector: a mismatch after patch application is
//! fatal to that pull and never silently ignored.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checksum;
mod error;
mod map;
mod patch;

pub use checksum::Checksum;
pub use error::{KvError, KvResult};
pub use map::{Map, ScanOptions};
pub use patch::{apply_patch, PatchOp};
