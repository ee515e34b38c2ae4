//! # palimpsest-ledger
//!
//! Append-only, SHA-256 hash-chained modification ledger.
//!
//! ## Overview
//!
//! Every tracked content item is a `LedgerEntry`. Each change to it is a
//! `ModificationRecord` whose `previous_digest` links to the digest that was
//! current before the change. Rewriting any stored record breaks that link
//! and is reported by `verify_chain`. Deletes are tombstone records; nothing
//! is ever removed.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use palimpsest_ledger::{InMemoryLedger, NewEntry};
//!
//! let ledger = InMemoryLedger::new(hasher, clock);
//! let entry = ledger.create_entry(NewEntry::new("Rates unchanged", "desk1").with_id("A"))?;
//! ledger.record_modification(&entry.id, "Rates cut 0.25%", ChangeType::Edit, None)?;
//!
//! assert!(ledger.verify_chain(&entry.id)?.valid);
//! ```

pub mod chain;
pub mod journal;
pub mod memory;

pub use chain::{first_broken, verify_entry, ChainFault, ChainVerification};
pub use journal::{read_journal, FileJournal, JournalRecord, JournalSink};
pub use memory::{InMemoryLedger, NewEntry, SubscriptionId};

// ── Tests ─────────────────────────────────────────────────────────────────────
