//! Error types for the Palimpsest ledger.
//!
//! All fallible operations in the workspace return `LedgerResult<T>`.
//! Variants carry enough context for an adapter layer to pick a status code
//! without parsing the message.

use thiserror::Error;

/// The unified error type for the Palimpsest crates.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed or missing input (empty requestor, unparsable date, ...).
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// The referenced entry does not exist in the store.
    #[error("entry '{entry_id}' not found")]
    EntryNotFound { entry_id: String },

    /// A caller-supplied entry id is already taken.
    #[error("entry '{entry_id}' already exists")]
    DuplicateId { entry_id: String },

    /// Chain verification found a broken hash link.
    ///
    /// `index` is the position of the first offending modification record, or
    /// `None` when the fault lies in the entry header itself.
    #[error("hash chain of entry '{entry_id}' is broken at {}", describe_index(.index))]
    ChainIntegrity { entry_id: String, index: Option<usize> },

    /// Building or sealing a snapshot failed. No partial report exists.
    #[error("report generation failed: {reason}")]
    ReportGeneration { reason: String },

    /// The referenced report was never issued by this orchestrator.
    #[error("report '{report_id}' not found")]
    ReportNotFound { report_id: String },

    /// Report generation was cancelled before the snapshot was sealed.
    #[error("report generation cancelled during {stage}")]
    Cancelled { stage: String },

    /// A report request attempted an illegal state transition.
    #[error("state machine error: {reason}")]
    StateMachine { reason: String },

    /// A configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// The append-only journal could not be written or replayed.
    #[error("journal error: {reason}")]
    Journal { reason: String },

    /// The in-memory store is unusable (a writer panicked while holding the lock).
    #[error("ledger store unavailable: {reason}")]
    StoreUnavailable { reason: String },
}

fn describe_index(index: &Option<usize>) -> String {
    match index {
        Some(i) => format!("modification {}", i),
        None => "the entry header".to_string(),
    }
}

/// Convenience alias used throughout the Palimpsest crates.
pub type LedgerResult<T> = Result<T, LedgerError>;
