//! Point-in-time snapshot types.
//!
//! A `Snapshot` is derived data: it is rebuilt on demand from the ledger and
//! never stored as a source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    entry::{EntryId, EntryStatus},
    hash::ContentHash,
};

/// The reconstructed state of one entry as of a snapshot's cutoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub id: EntryId,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub content: String,
    pub digest: ContentHash,
    pub status: EntryStatus,

    /// Modifications replayed to reach this state.
    pub applied_modifications: usize,

    /// Timestamp of the last replayed modification, if any.
    pub last_modified_at: Option<DateTime<Utc>>,

    /// Whether the entry's full hash chain verified when the snapshot was built.
    /// Broken entries stay in the snapshot but are not counted as verified.
    pub chain_valid: bool,
}

/// Aggregate counts over a snapshot's entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCounts {
    pub total: usize,
    pub active: usize,
    pub deleted: usize,
    /// Entries with at least one replayed modification.
    pub modified: usize,
    /// Entries whose hash chain verified.
    pub verified: usize,
}

/// The ledger as it existed at `as_of`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The requested cutoff.
    pub as_of: DateTime<Utc>,

    /// Reconstructed entries ordered by `(created_at, id)`.
    pub entries: Vec<SnapshotEntry>,

    pub counts: SnapshotCounts,

    /// Merkle fold of every entry's reconstructed digest, or
    /// `ContentHash::EMPTY_SET` when there are no entries.
    pub merkle_root: ContentHash,

    /// Wall-clock time the snapshot was produced.
    pub sealed_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn entry(&self, id: &EntryId) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }
}
