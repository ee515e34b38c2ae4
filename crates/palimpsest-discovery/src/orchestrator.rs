//! The legal discovery orchestrator.
//!
//! `LegalDiscovery` turns a `DiscoveryRequest` into a sealed `LegalReport`:
//!
//!   Received → Validated → SnapshotBuilt → Sealed → Delivered
//!
//! Every transition is checked against `ReportState::can_transition_to`.
//! Cancellation is honoured up to `Sealed`; after that the report is
//! immutable and cancelling has no effect. Any failure moves the request to
//! `Failed` and returns an error. A partial report is never returned or stored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tracing::{debug, info, warn};

use palimpsest_contracts::{
    entry::EntryId,
    error::{LedgerError, LedgerResult},
    hash::ContentHash,
    report::{CustodyAction, DiscoveryRequest, ExportFormat, LegalReport, ReportId, ReportState},
    snapshot::SnapshotEntry,
};
use palimpsest_core::traits::{Clock, ContentHasher};
use palimpsest_ledger::InMemoryLedger;
use palimpsest_snapshot::{
    build_snapshot, merkle_proof, reconstruct_entry, seal_snapshot, verify_seal, MerkleProof,
};

use crate::{
    config::DiscoverySettings,
    custody::{first_invalid_custody, sign_custody},
    export::render,
};

// ── Cancellation ──────────────────────────────────────────────────────────────

/// Shared flag a caller sets to abandon a report request.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Request state machine ─────────────────────────────────────────────────────

/// Tracks one request through the report state machine.
struct ReportProgress<'a> {
    report_id: &'a ReportId,
    state: ReportState,
}

impl<'a> ReportProgress<'a> {
    fn new(report_id: &'a ReportId) -> Self {
        Self { report_id, state: ReportState::Received }
    }

    fn advance(&mut self, next: ReportState) -> LedgerResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(LedgerError::StateMachine {
                reason: format!("report '{}' cannot move from {} to {}", self.report_id, self.state, next),
            });
        }
        debug!(report_id = %self.report_id, from = %self.state, to = %next, "report state transition");
        self.state = next;
        Ok(())
    }

    /// Stop with `Cancelled` if the token is set and cancellation still applies.
    fn checkpoint(&mut self, cancel: &CancellationToken) -> LedgerResult<()> {
        if cancel.is_cancelled() && self.state.is_cancellable() {
            let stage = self.state.to_string();
            self.advance(ReportState::Cancelled)?;
            info!(report_id = %self.report_id, stage = %stage, "report generation cancelled");
            return Err(LedgerError::Cancelled { stage });
        }
        Ok(())
    }

    fn fail(&mut self, error: &LedgerError) {
        if self.state.can_transition_to(ReportState::Failed) {
            warn!(report_id = %self.report_id, state = %self.state, error = %error, "report generation failed");
            self.state = ReportState::Failed;
        }
    }
}

/// Result of re-checking an issued report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportVerification {
    /// The Merkle root and proof digest recompute from the snapshot.
    pub seal_valid: bool,
    /// First custody record that fails to recompute, if any.
    pub broken_custody_at: Option<usize>,
}

impl ReportVerification {
    pub fn is_valid(&self) -> bool {
        self.seal_valid && self.broken_custody_at.is_none()
    }
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

/// Produces and keeps sealed legal reports over one ledger.
pub struct LegalDiscovery {
    ledger: Arc<InMemoryLedger>,
    hasher: Arc<dyn ContentHasher>,
    clock: Arc<dyn Clock>,
    settings: DiscoverySettings,
    reports: RwLock<HashMap<ReportId, LegalReport>>,
}

impl LegalDiscovery {
    pub fn new(
        ledger: Arc<InMemoryLedger>,
        hasher: Arc<dyn ContentHasher>,
        clock: Arc<dyn Clock>,
        settings: DiscoverySettings,
    ) -> Self {
        Self {
            ledger,
            hasher,
            clock,
            settings,
            reports: RwLock::new(HashMap::new()),
        }
    }

    /// Build, seal, and store a report for `request`.
    pub fn create_report(&self, request: DiscoveryRequest) -> LedgerResult<LegalReport> {
        self.create_report_cancellable(request, &CancellationToken::new())
    }

    /// Like `create_report`, abandoning the request if `cancel` is set before
    /// the snapshot is sealed.
    pub fn create_report_cancellable(
        &self,
        request: DiscoveryRequest,
        cancel: &CancellationToken,
    ) -> LedgerResult<LegalReport> {
        let report_id = ReportId::generate();
        let mut progress = ReportProgress::new(&report_id);

        let report = match self.generate(&mut progress, request, cancel) {
            Ok(report) => report,
            Err(e) => {
                if !matches!(e, LedgerError::Cancelled { .. }) {
                    progress.fail(&e);
                }
                return Err(e);
            }
        };

        self.reports
            .write()
            .map_err(|e| LedgerError::StoreUnavailable {
                reason: format!("report store lock poisoned: {}", e),
            })?
            .insert(report.id.clone(), report.clone());

        info!(
            report_id = %report.id,
            requestor = %report.request.requestor,
            as_of = %report.snapshot.as_of,
            entries = report.snapshot.counts.total,
            merkle_root = %report.snapshot.merkle_root.short(),
            proof_digest = %report.proof_digest.short(),
            "legal report delivered"
        );

        Ok(report)
    }

    fn generate(
        &self,
        progress: &mut ReportProgress<'_>,
        request: DiscoveryRequest,
        cancel: &CancellationToken,
    ) -> LedgerResult<LegalReport> {
        progress.checkpoint(cancel)?;
        let as_of = validate_request(&request)?;
        progress.advance(ReportState::Validated)?;

        progress.checkpoint(cancel)?;
        let entries = self.ledger.list_entries().map_err(|e| LedgerError::ReportGeneration {
            reason: format!("failed to read ledger: {}", e),
        })?;
        let in_scope = entries.iter().filter(|e| e.created_at <= as_of).count();
        if in_scope > self.settings.max_entries {
            return Err(LedgerError::ReportGeneration {
                reason: format!(
                    "snapshot at {} holds {} entries, limit is {}",
                    as_of, in_scope, self.settings.max_entries
                ),
            });
        }
        let snapshot = build_snapshot(self.hasher.as_ref(), as_of, &entries, self.clock.now());
        progress.advance(ReportState::SnapshotBuilt)?;

        progress.checkpoint(cancel)?;
        let proof_digest = seal_snapshot(self.hasher.as_ref(), &snapshot)?;
        progress.advance(ReportState::Sealed)?;

        let now = self.clock.now();
        let key = &self.settings.signing_key;
        let hasher = self.hasher.as_ref();
        let chain_of_custody = vec![
            sign_custody(
                hasher,
                key,
                progress.report_id,
                &proof_digest,
                now,
                CustodyAction::Created,
                &self.settings.system_actor,
            )?,
            sign_custody(
                hasher,
                key,
                progress.report_id,
                &proof_digest,
                now,
                CustodyAction::Accessed,
                &request.requestor,
            )?,
        ];
        progress.advance(ReportState::Delivered)?;

        Ok(LegalReport {
            id: progress.report_id.clone(),
            request,
            snapshot,
            proof_digest,
            chain_of_custody,
            status: progress.state,
            generated_at: now,
        })
    }

    /// A previously issued report.
    pub fn get_report(&self, id: &ReportId) -> LedgerResult<LegalReport> {
        self.reports
            .read()
            .map_err(|e| LedgerError::StoreUnavailable {
                reason: format!("report store lock poisoned: {}", e),
            })?
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::ReportNotFound { report_id: id.0.clone() })
    }

    /// Serialize an issued report, recording the export on its custody trail.
    ///
    /// The returned document includes the new `exported` record.
    pub fn export_report(&self, id: &ReportId, format: ExportFormat, actor: &str) -> LedgerResult<String> {
        if actor.trim().is_empty() {
            return Err(LedgerError::Validation { reason: "export actor must not be empty".to_string() });
        }

        let mut reports = self.reports.write().map_err(|e| LedgerError::StoreUnavailable {
            reason: format!("report store lock poisoned: {}", e),
        })?;
        let report = reports
            .get_mut(id)
            .ok_or_else(|| LedgerError::ReportNotFound { report_id: id.0.clone() })?;

        let record = sign_custody(
            self.hasher.as_ref(),
            &self.settings.signing_key,
            &report.id,
            &report.proof_digest,
            self.clock.now(),
            CustodyAction::Exported,
            actor,
        )?;

        // Commit the record only once the document has rendered.
        let mut exported = report.clone();
        exported.chain_of_custody.push(record);
        let document = render(&exported, format)?;
        *report = exported;

        info!(report_id = %id, actor = %actor, format = ?format, "legal report exported");
        Ok(document)
    }

    /// Recompute the seal and every custody token of `report`.
    pub fn verify_report(&self, report: &LegalReport) -> LedgerResult<ReportVerification> {
        let hasher = self.hasher.as_ref();
        Ok(ReportVerification {
            seal_valid: verify_seal(hasher, &report.snapshot, &report.proof_digest)?,
            broken_custody_at: first_invalid_custody(hasher, &self.settings.signing_key, report)?,
        })
    }

    /// Merkle path showing `entry_id` is covered by the report's root.
    ///
    /// `None` if the entry is not part of the report's snapshot.
    pub fn inclusion_proof(&self, report: &LegalReport, entry_id: &EntryId) -> Option<MerkleProof> {
        let entries = &report.snapshot.entries;
        let index = entries.iter().position(|e| &e.id == entry_id)?;
        let leaves: Vec<ContentHash> = entries.iter().map(|e| e.digest).collect();
        merkle_proof(self.hasher.as_ref(), &leaves, index)
    }

    /// One entry as it stood at `as_of`, or as it stands now.
    ///
    /// `Ok(None)` means the entry exists but had not been created by `as_of`.
    pub fn entry_as_of(
        &self,
        id: &EntryId,
        as_of: Option<DateTime<Utc>>,
    ) -> LedgerResult<Option<SnapshotEntry>> {
        let entry = self
            .ledger
            .get_entry(id)?
            .ok_or_else(|| LedgerError::EntryNotFound { entry_id: id.0.clone() })?;
        let as_of = as_of.unwrap_or(DateTime::<Utc>::MAX_UTC);
        Ok(reconstruct_entry(self.hasher.as_ref(), &entry, as_of))
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

fn validate_request(request: &DiscoveryRequest) -> LedgerResult<DateTime<Utc>> {
    if request.requestor.trim().is_empty() {
        return Err(LedgerError::Validation { reason: "requestor must not be empty".to_string() });
    }
    if request.description.trim().is_empty() {
        return Err(LedgerError::Validation { reason: "description must not be empty".to_string() });
    }
    parse_target_date(&request.target_date)
}

/// Parse an RFC 3339 timestamp, or a `YYYY-MM-DD` date meaning the last
/// instant of that UTC day.
pub fn parse_target_date(input: &str) -> LedgerResult<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }

    let invalid = || LedgerError::Validation {
        reason: format!("target date '{}' is not an RFC 3339 timestamp or YYYY-MM-DD date", input),
    };
    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| invalid())?;
    let end_of_day = date.and_hms_nano_opt(23, 59, 59, 999_999_999).ok_or_else(invalid)?;
    Ok(Utc.from_utc_datetime(&end_of_day))
}
