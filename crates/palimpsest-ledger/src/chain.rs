//! Hash-chain verification for a single ledger entry.
//!
//! An entry's chain is valid when all of the following hold:
//!
//!   1. `original_digest == digest(original_content)`
//!   2. for every record `i`: `previous_digest` equals the digest that was
//!      current before it (`original_digest` for `i == 0`, otherwise
//!      `modifications[i - 1].new_digest`)
//!   3. for every record `i`: `new_digest == digest(new_content)`
//!   4. timestamps never run backwards and never precede `created_at`
//!   5. `current_digest` equals the last `new_digest` (or `original_digest`)
//!      and `digest(current_content)`
//!
//! Verification stops at the first fault. It never repairs anything.

use serde::{Deserialize, Serialize};

use palimpsest_contracts::{
    entry::{EntryId, LedgerEntry},
    error::{LedgerError, LedgerResult},
};
use palimpsest_core::traits::ContentHasher;

/// Why a chain failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFault {
    /// The stored original digest does not match the original content.
    OriginalDigestMismatch,
    /// A record's `previous_digest` does not link to its predecessor.
    LinkMismatch,
    /// A record's `new_digest` does not match its `new_content`.
    DigestMismatch,
    /// A record is timestamped before its predecessor or the entry's creation.
    TimestampRegression,
    /// The entry's current state disagrees with the chain head.
    HeadMismatch,
}

/// The outcome of verifying one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    pub valid: bool,
    /// Index of the first offending modification record. `None` when the
    /// chain is valid or the fault is in the entry header.
    pub broken_at: Option<usize>,
    pub fault: Option<ChainFault>,
}

impl ChainVerification {
    pub const VALID: ChainVerification = ChainVerification { valid: true, broken_at: None, fault: None };

    fn broken(fault: ChainFault, broken_at: Option<usize>) -> Self {
        Self { valid: false, broken_at, fault: Some(fault) }
    }
}

/// Walk `entry`'s modification list and report the first broken link.
pub fn verify_entry(entry: &LedgerEntry, hasher: &dyn ContentHasher) -> ChainVerification {
    if hasher.digest_str(&entry.original_content) != entry.original_digest {
        return ChainVerification::broken(ChainFault::OriginalDigestMismatch, None);
    }

    let mut expected_prev = entry.original_digest;
    let mut last_timestamp = entry.created_at;

    for (index, record) in entry.modifications.iter().enumerate() {
        if record.previous_digest != expected_prev {
            return ChainVerification::broken(ChainFault::LinkMismatch, Some(index));
        }

        if hasher.digest_str(&record.new_content) != record.new_digest {
            return ChainVerification::broken(ChainFault::DigestMismatch, Some(index));
        }

        if record.timestamp < last_timestamp {
            return ChainVerification::broken(ChainFault::TimestampRegression, Some(index));
        }

        expected_prev = record.new_digest;
        last_timestamp = record.timestamp;
    }

    if entry.current_digest != expected_prev
        || hasher.digest_str(&entry.current_content) != entry.current_digest
    {
        return ChainVerification::broken(ChainFault::HeadMismatch, None);
    }

    ChainVerification::VALID
}

/// Turn the first broken result of a `verify_all` pass into `ChainIntegrity`.
pub fn first_broken(results: &[(EntryId, ChainVerification)]) -> LedgerResult<()> {
    match results.iter().find(|(_, v)| !v.valid) {
        Some((id, v)) => Err(LedgerError::ChainIntegrity {
            entry_id: id.0.clone(),
            index: v.broken_at,
        }),
        None => Ok(()),
    }
}
