//! # palimpsest-core
//!
//! The seams and leaf services of the Palimpsest modification ledger.
//!
//! This crate provides:
//! - The three core traits (`ContentHasher`, `Clock`, `LedgerObserver`)
//! - `Sha256Hasher`, the default hashing service
//! - `SystemClock` and `ManualClock`
//! - The positional word-level `diff` engine
//!
//! ## Usage
//!
//! ```rust,ignore
//! use palimpsest_core::{diff, traits::ContentHasher, Sha256Hasher};
//!
//! let hasher = Sha256Hasher::new();
//! let digest = hasher.digest_str("Rates unchanged");
//! let summary = diff("Rates unchanged", "Rates cut 0.25%");
//! ```

pub mod clock;
pub mod diff;
pub mod hasher;
pub mod traits;

pub use clock::{ManualClock, SystemClock};
pub use diff::diff;
pub use hasher::Sha256Hasher;

// ── Tests ─────────────────────────────────────────────────────────────────────
