//! Legal discovery request and report types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{LedgerError, LedgerResult},
    hash::ContentHash,
    snapshot::Snapshot,
};

/// Identifier of an issued legal report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(pub String);

impl ReportId {
    pub fn generate() -> Self {
        Self(format!("LR-{}", uuid::Uuid::new_v4()))
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a requestor asks for: the ledger as of `target_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    /// RFC 3339 timestamp or `YYYY-MM-DD` (end of that UTC day).
    pub target_date: String,
    pub requestor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_ref: Option<String>,
    /// Free-text justification.
    pub description: String,
}

/// What happened to a report at one point of its custody trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustodyAction {
    Created,
    Accessed,
    Exported,
}

impl fmt::Display for CustodyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CustodyAction::Created => "created",
            CustodyAction::Accessed => "accessed",
            CustodyAction::Exported => "exported",
        };
        f.write_str(s)
    }
}

/// One link in a report's chain of custody.
///
/// `digest` commits to the record's fields and the report's proof digest;
/// `signature_token` binds `digest` to the issuing orchestrator's key. Both
/// can be recomputed by a verifier holding the same key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustodyRecord {
    pub timestamp: DateTime<Utc>,
    pub action: CustodyAction,
    pub actor: String,
    pub digest: ContentHash,
    pub signature_token: ContentHash,
}

/// Lifecycle of a report request.
///
/// ```text
/// Received -> Validated -> SnapshotBuilt -> Sealed -> Delivered
///     \__________\______________\__________\-> Failed
///     \__________\______________\-> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    Received,
    Validated,
    SnapshotBuilt,
    Sealed,
    Delivered,
    Cancelled,
    Failed,
}

impl ReportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ReportState::Delivered | ReportState::Cancelled | ReportState::Failed)
    }

    /// Whether cancellation can still take effect. False once sealed.
    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            ReportState::Received | ReportState::Validated | ReportState::SnapshotBuilt
        )
    }

    /// Legal transitions of the report state machine.
    pub fn can_transition_to(self, next: ReportState) -> bool {
        use ReportState::*;
        match (self, next) {
            (Received, Validated)
            | (Validated, SnapshotBuilt)
            | (SnapshotBuilt, Sealed)
            | (Sealed, Delivered) => true,
            (from, Failed) => !from.is_terminal(),
            (from, Cancelled) => from.is_cancellable(),
            _ => false,
        }
    }
}

impl fmt::Display for ReportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportState::Received => "received",
            ReportState::Validated => "validated",
            ReportState::SnapshotBuilt => "snapshot_built",
            ReportState::Sealed => "sealed",
            ReportState::Delivered => "delivered",
            ReportState::Cancelled => "cancelled",
            ReportState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A sealed point-in-time report of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalReport {
    pub id: ReportId,
    pub request: DiscoveryRequest,
    pub snapshot: Snapshot,

    /// Local integrity seal over `(merkle_root, as_of, counts.total)`.
    /// This is not a blockchain anchor.
    pub proof_digest: ContentHash,

    /// Append-only custody trail, oldest first.
    pub chain_of_custody: Vec<CustodyRecord>,

    pub status: ReportState,
    pub generated_at: DateTime<Utc>,
}

/// Serialization formats supported by report export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = LedgerError;

    fn from_str(s: &str) -> LedgerResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(LedgerError::Validation {
                reason: format!("unsupported export format '{}' (expected json or csv)", other),
            }),
        }
    }
}
