//! Core trait definitions for the Palimpsest ledger.
//!
//! These three traits are the seams every other crate is written against:
//!
//! - `ContentHasher`:  content digest and digest combination
//! - `Clock`:          source of modification and custody timestamps
//! - `LedgerObserver`: optional notification hook for writes
//!
//! The store and orchestrator hold them as `Arc<dyn _>` so tests can inject
//! deterministic implementations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use palimpsest_contracts::{
    entry::{ChangeType, EntryId},
    hash::ContentHash,
};

/// Deterministic content hashing.
///
/// Implementations must be pure: the same input always yields the same
/// digest. `combine` must be order-sensitive, so that
/// `combine(a, b) != combine(b, a)` whenever `a != b`.
pub trait ContentHasher: Send + Sync {
    /// Digest arbitrary bytes.
    fn digest(&self, content: &[u8]) -> ContentHash;

    /// Fold two digests into one. Used for Merkle folding and custody tokens.
    fn combine(&self, left: &ContentHash, right: &ContentHash) -> ContentHash;

    /// Digest a UTF-8 string.
    fn digest_str(&self, content: &str) -> ContentHash {
        self.digest(content.as_bytes())
    }
}

/// A source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// A successful write to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEvent {
    EntryCreated {
        entry_id: EntryId,
        digest: ContentHash,
        at: DateTime<Utc>,
    },
    ModificationRecorded {
        entry_id: EntryId,
        modification_id: u64,
        change_type: ChangeType,
        new_digest: ContentHash,
        at: DateTime<Utc>,
    },
}

impl LedgerEvent {
    pub fn entry_id(&self) -> &EntryId {
        match self {
            LedgerEvent::EntryCreated { entry_id, .. }
            | LedgerEvent::ModificationRecorded { entry_id, .. } => entry_id,
        }
    }
}

/// Receives a notification after every successful ledger write.
///
/// Called after the store's lock has been released, so implementations may
/// read from the store. Observers cannot fail a write: the write has already
/// happened when they run.
pub trait LedgerObserver: Send + Sync {
    fn on_event(&self, event: &LedgerEvent);
}
