//! # palimpsest-contracts
//!
//! Shared types, digests, and error contracts for the Palimpsest
//! modification ledger.
//!
//! All crates in the workspace import from here. No ledger logic lives in
//! this crate: only data definitions and error types.

pub mod diff;
pub mod entry;
pub mod error;
pub mod hash;
pub mod report;
pub mod snapshot;
