//! Ledger entry and modification record types.
//!
//! A `LedgerEntry` is the tracked content item. Its history is the ordered
//! list of `ModificationRecord`s, each linked to the digest that was current
//! before it was appended. These types are plain data: every mutation goes
//! through the recorder in `palimpsest-ledger`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    diff::DiffSummary,
    error::{LedgerError, LedgerResult},
    hash::ContentHash,
};

/// Opaque identifier of a tracked content item.
///
/// Callers may choose their own ids (e.g. an article slug); otherwise the
/// store generates a UUID v4.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub String);

impl EntryId {
    /// Create a new, unique entry id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The kind of change a modification record applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Edit,
    /// Logical tombstone. The entry stays in the store with its history.
    Delete,
    /// Reverses a prior delete.
    Restore,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeType::Edit => "edit",
            ChangeType::Delete => "delete",
            ChangeType::Restore => "restore",
        };
        f.write_str(s)
    }
}

impl FromStr for ChangeType {
    type Err = LedgerError;

    fn from_str(s: &str) -> LedgerResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "edit" => Ok(ChangeType::Edit),
            "delete" => Ok(ChangeType::Delete),
            "restore" => Ok(ChangeType::Restore),
            other => Err(LedgerError::Validation {
                reason: format!("unknown change type '{}' (expected edit, delete or restore)", other),
            }),
        }
    }
}

/// Visibility of an entry at some point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Active,
    Deleted,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Active => f.write_str("active"),
            EntryStatus::Deleted => f.write_str("deleted"),
        }
    }
}

/// One immutable change in an entry's history.
///
/// `previous_digest` links the record to the digest that was current when it
/// was appended; rewriting any earlier record breaks that link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModificationRecord {
    /// Position within the entry's history, starting at 0.
    pub id: u64,

    /// Logical time of the change. Never earlier than the previous record.
    pub timestamp: DateTime<Utc>,

    /// Digest that was current immediately before this record.
    pub previous_digest: ContentHash,

    /// Digest of `new_content`.
    pub new_digest: ContentHash,

    /// The content this modification installs.
    pub new_content: String,

    pub change_type: ChangeType,

    /// Word-level changes relative to the previous content.
    pub diff_summary: DiffSummary,

    /// Opaque handle to an external transaction or proof identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
}

/// A tracked content item and its complete modification history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,

    /// Creating party. Immutable.
    pub author: String,

    pub created_at: DateTime<Utc>,

    pub original_content: String,
    pub original_digest: ContentHash,

    pub current_content: String,
    pub current_digest: ContentHash,

    /// Append order is chronological order.
    pub modifications: Vec<ModificationRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
}

impl LedgerEntry {
    /// Timestamp of the most recent modification, or `created_at`.
    pub fn last_changed_at(&self) -> DateTime<Utc> {
        self.modifications
            .last()
            .map(|m| m.timestamp)
            .unwrap_or(self.created_at)
    }
}
