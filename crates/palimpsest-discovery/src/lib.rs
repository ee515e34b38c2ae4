//! # palimpsest-discovery
//!
//! Legal discovery over the Palimpsest ledger: point-in-time reports sealed
//! with a Merkle root and a local integrity seal, carrying a chain of custody
//! whose every link can be recomputed.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use palimpsest_discovery::{LegalDiscovery, PalimpsestConfig};
//!
//! let config = PalimpsestConfig::from_file(Path::new("palimpsest.toml"))?;
//! let discovery = LegalDiscovery::new(ledger, hasher, clock, config.discovery);
//! let report = discovery.create_report(DiscoveryRequest {
//!     target_date: "2024-03-01".into(),
//!     requestor: "counsel@example.com".into(),
//!     case_ref: Some("CV-2024-118".into()),
//!     description: "Edits to rate announcements".into(),
//! })?;
//! let csv = discovery.export_report(&report.id, ExportFormat::Csv, "paralegal")?;
//! ```

pub mod config;
pub mod custody;
pub mod export;
pub mod orchestrator;

pub use config::{DiscoverySettings, LedgerSettings, PalimpsestConfig};
pub use orchestrator::{parse_target_date, CancellationToken, LegalDiscovery, ReportVerification};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Timelike, Utc};

    use palimpsest_contracts::{
        entry::{ChangeType, EntryId, EntryStatus},
        error::LedgerError,
        report::{CustodyAction, DiscoveryRequest, ExportFormat, ReportId, ReportState},
    };
    use palimpsest_core::{
        traits::{Clock, ContentHasher},
        ManualClock, Sha256Hasher,
    };
    use palimpsest_ledger::{InMemoryLedger, NewEntry};
    use palimpsest_snapshot::verify_proof;

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    /// "A" created at 100, edited at 200, deleted at 300; "B" created at 250.
    fn seeded_ledger(clock: Arc<ManualClock>) -> Arc<InMemoryLedger> {
        let ledger = InMemoryLedger::new(Arc::new(Sha256Hasher::new()), clock.clone());
        clock.set(at(100));
        let a = ledger
            .create_entry(NewEntry::new("Rates unchanged", "desk1").with_id("A"))
            .unwrap();
        clock.set(at(200));
        ledger.record_modification(&a.id, "Rates cut 0.25%", ChangeType::Edit, None).unwrap();
        clock.set(at(250));
        ledger
            .create_entry(NewEntry::new("Markets open higher", "desk2").with_id("B"))
            .unwrap();
        clock.set(at(300));
        ledger.record_modification(&a.id, "", ChangeType::Delete, None).unwrap();
        clock.set(at(1_000));
        Arc::new(ledger)
    }

    fn discovery_with(settings: DiscoverySettings) -> (LegalDiscovery, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(at(0)));
        let ledger = seeded_ledger(clock.clone());
        let discovery = LegalDiscovery::new(ledger, Arc::new(Sha256Hasher::new()), clock.clone(), settings);
        (discovery, clock)
    }

    fn discovery() -> LegalDiscovery {
        discovery_with(DiscoverySettings::default()).0
    }

    /// Fixed-time clock that sets `token` on its `cancel_on`-th reading.
    struct CancellingClock {
        at: DateTime<Utc>,
        calls: AtomicUsize,
        cancel_on: usize,
        token: CancellationToken,
    }

    impl Clock for CancellingClock {
        fn now(&self) -> DateTime<Utc> {
            if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.cancel_on {
                self.token.cancel();
            }
            self.at
        }
    }

    fn cancelling_discovery(cancel_on: usize) -> (LegalDiscovery, CancellationToken) {
        let ledger = seeded_ledger(Arc::new(ManualClock::new(at(0))));
        let token = CancellationToken::new();
        let clock = Arc::new(CancellingClock {
            at: at(1_000),
            calls: AtomicUsize::new(0),
            cancel_on,
            token: token.clone(),
        });
        let discovery =
            LegalDiscovery::new(ledger, Arc::new(Sha256Hasher::new()), clock, DiscoverySettings::default());
        (discovery, token)
    }

    fn request(target_date: &str) -> DiscoveryRequest {
        DiscoveryRequest {
            target_date: target_date.to_string(),
            requestor: "counsel".to_string(),
            case_ref: Some("CV-118".to_string()),
            description: "rate announcement edits".to_string(),
        }
    }

    // ── Report creation ───────────────────────────────────────────────────────

    #[test]
    fn test_create_report_seals_snapshot_at_target() {
        let discovery = discovery();
        let report = discovery.create_report(request("1970-01-01T00:04:10Z")).unwrap();

        assert_eq!(report.status, ReportState::Delivered);
        assert_eq!(report.snapshot.as_of, at(250));
        assert_eq!(report.snapshot.counts.total, 2);
        assert_eq!(report.snapshot.counts.active, 2);
        assert_eq!(report.snapshot.counts.modified, 1);
        assert_eq!(report.snapshot.counts.verified, 2);
        assert!(report.id.0.starts_with("LR-"));
    }

    #[test]
    fn test_report_custody_has_created_then_accessed() {
        let discovery = discovery();
        let report = discovery.create_report(request("1970-01-01T00:05:50Z")).unwrap();

        let custody = &report.chain_of_custody;
        assert_eq!(custody.len(), 2);
        assert_eq!(custody[0].action, CustodyAction::Created);
        assert_eq!(custody[0].actor, "system");
        assert_eq!(custody[1].action, CustodyAction::Accessed);
        assert_eq!(custody[1].actor, "counsel");
        assert_ne!(custody[0].signature_token, custody[1].signature_token);

        let verification = discovery.verify_report(&report).unwrap();
        assert!(verification.is_valid(), "{:?}", verification);
    }

    #[test]
    fn test_report_counts_deleted_after_delete() {
        let discovery = discovery();
        let report = discovery.create_report(request("1970-01-01T00:05:50Z")).unwrap();
        assert_eq!(report.snapshot.counts.deleted, 1);
        assert_eq!(
            report.snapshot.entry(&EntryId::from("A")).unwrap().status,
            EntryStatus::Deleted
        );
    }

    /// Identical ledgers and targets give identical roots and seals, even
    /// across orchestrator instances.
    #[test]
    fn test_reports_are_deterministic_across_instances() {
        let first = discovery().create_report(request("1970-01-01T00:04:10Z")).unwrap();
        let second = discovery().create_report(request("1970-01-01T00:04:10Z")).unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.snapshot.merkle_root, second.snapshot.merkle_root);
        assert_eq!(first.proof_digest, second.proof_digest);
    }

    #[test]
    fn test_date_only_target_covers_whole_day() {
        let discovery = discovery();
        let report = discovery.create_report(request("1970-01-01")).unwrap();
        assert_eq!(report.snapshot.counts.total, 2);
        assert_eq!(report.snapshot.as_of.hour(), 23);
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn test_rejects_empty_requestor_and_description() {
        let discovery = discovery();

        let mut req = request("1970-01-01");
        req.requestor = "  ".into();
        assert!(matches!(discovery.create_report(req), Err(LedgerError::Validation { .. })));

        let mut req = request("1970-01-01");
        req.description = String::new();
        assert!(matches!(discovery.create_report(req), Err(LedgerError::Validation { .. })));
    }

    #[test]
    fn test_rejects_unparsable_target_date() {
        let discovery = discovery();
        let err = discovery.create_report(request("last tuesday")).unwrap_err();
        match err {
            LedgerError::Validation { reason } => assert!(reason.contains("last tuesday")),
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_target_date_accepts_offsets() {
        let parsed = parse_target_date("1970-01-01T01:00:00+01:00").unwrap();
        assert_eq!(parsed, at(0));
    }

    // ── Failure and cancellation ──────────────────────────────────────────────

    /// Over the entry limit: an error, and nothing is stored.
    #[test]
    fn test_entry_limit_fails_without_partial_report() {
        let settings = DiscoverySettings { max_entries: 1, ..DiscoverySettings::default() };
        let (discovery, _) = discovery_with(settings);

        let err = discovery.create_report(request("1970-01-01")).unwrap_err();
        assert!(matches!(err, LedgerError::ReportGeneration { .. }));

        // A target that only sees one entry is still within the limit.
        discovery.create_report(request("1970-01-01T00:03:00Z")).unwrap();
    }

    #[test]
    fn test_cancelled_request_returns_cancelled() {
        let discovery = discovery();
        let token = CancellationToken::new();
        token.cancel();

        let err = discovery.create_report_cancellable(request("1970-01-01"), &token).unwrap_err();
        assert!(matches!(err, LedgerError::Cancelled { ref stage } if stage == "received"));
    }

    /// The snapshot timestamp is the first clock reading; cancelling there
    /// stops the request before it is sealed.
    #[test]
    fn test_cancel_while_building_snapshot_stops_before_seal() {
        let (discovery, token) = cancelling_discovery(1);

        let err = discovery.create_report_cancellable(request("1970-01-01"), &token).unwrap_err();
        assert!(
            matches!(err, LedgerError::Cancelled { ref stage } if stage == "snapshot_built"),
            "got {:?}",
            err
        );
    }

    /// The custody timestamp is read after sealing; cancelling then has no effect.
    #[test]
    fn test_cancel_after_seal_still_delivers() {
        let (discovery, token) = cancelling_discovery(2);

        let report = discovery.create_report_cancellable(request("1970-01-01"), &token).unwrap();
        assert!(token.is_cancelled());
        assert_eq!(report.status, ReportState::Delivered);
        assert_eq!(discovery.get_report(&report.id).unwrap().chain_of_custody.len(), 2);
    }

    // ── Retrieval and export ──────────────────────────────────────────────────

    #[test]
    fn test_get_report_unknown_id() {
        let err = discovery().get_report(&ReportId("LR-missing".into())).unwrap_err();
        assert!(matches!(err, LedgerError::ReportNotFound { .. }));
    }

    #[test]
    fn test_export_csv_rows_and_custody() {
        let discovery = discovery();
        let report = discovery.create_report(request("1970-01-01")).unwrap();

        let csv = discovery.export_report(&report.id, ExportFormat::Csv, "paralegal").unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], export::CSV_HEADER);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("A,desk1,deleted,"));
        assert!(lines[2].starts_with("B,desk2,active,"));

        let stored = discovery.get_report(&report.id).unwrap();
        assert_eq!(stored.chain_of_custody.len(), 3);
        assert_eq!(stored.chain_of_custody[2].action, CustodyAction::Exported);
        assert_eq!(stored.chain_of_custody[2].actor, "paralegal");
        assert!(discovery.verify_report(&stored).unwrap().is_valid());
    }

    #[test]
    fn test_failed_export_leaves_custody_untouched() {
        let discovery = discovery();
        let report = discovery.create_report(request("1970-01-01")).unwrap();

        let err = discovery.export_report(&report.id, ExportFormat::Json, "  ").unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));
        assert_eq!(discovery.get_report(&report.id).unwrap().chain_of_custody.len(), 2);
    }

    #[test]
    fn test_export_json_parses_back() {
        let discovery = discovery();
        let report = discovery.create_report(request("1970-01-01")).unwrap();

        let json = discovery.export_report(&report.id, ExportFormat::Json, "paralegal").unwrap();
        let parsed: palimpsest_contracts::report::LegalReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.proof_digest, report.proof_digest);
        assert_eq!(parsed.snapshot, report.snapshot);
        assert!(discovery.verify_report(&parsed).unwrap().is_valid());
    }

    // ── Verification ──────────────────────────────────────────────────────────

    #[test]
    fn test_verify_report_detects_forged_custody_and_seal() {
        let discovery = discovery();
        let report = discovery.create_report(request("1970-01-01")).unwrap();

        let mut forged = report.clone();
        forged.chain_of_custody[1].actor = "someone else".into();
        assert_eq!(discovery.verify_report(&forged).unwrap().broken_custody_at, Some(1));

        let mut altered = report.clone();
        altered.snapshot.entries.pop();
        let verification = discovery.verify_report(&altered).unwrap();
        assert!(!verification.seal_valid);
    }

    #[test]
    fn test_verify_report_detects_rewritten_entry_content() {
        let discovery = discovery();
        let mut report = discovery.create_report(request("1970-01-01T00:04:10Z")).unwrap();

        report.snapshot.entries[0].content = "Rates raised 5%".into();
        report.snapshot.entries[0].status = EntryStatus::Deleted;

        let verification = discovery.verify_report(&report).unwrap();
        assert!(!verification.seal_valid, "altered snapshot content must not verify");
        assert!(!verification.is_valid());
    }

    #[test]
    fn test_inclusion_proof_ties_entry_to_report_root() {
        let discovery = discovery();
        let report = discovery.create_report(request("1970-01-01")).unwrap();
        let hasher = Sha256Hasher::new();
        let root = report.snapshot.merkle_root;

        let b = report.snapshot.entry(&EntryId::from("B")).unwrap();
        let proof = discovery.inclusion_proof(&report, &b.id).unwrap();
        assert!(verify_proof(&hasher, &root, &b.digest, &proof));
        assert!(!verify_proof(&hasher, &root, &hasher.digest_str("forged"), &proof));

        assert!(discovery.inclusion_proof(&report, &EntryId::from("Z")).is_none());
    }

    #[test]
    fn test_custody_tokens_depend_on_signing_key() {
        let (keyed, _) = discovery_with(DiscoverySettings {
            signing_key: "other-key".into(),
            ..DiscoverySettings::default()
        });
        let report = keyed.create_report(request("1970-01-01")).unwrap();

        let verification = discovery().verify_report(&report).unwrap();
        assert!(verification.seal_valid, "the seal does not use the key");
        assert_eq!(verification.broken_custody_at, Some(0));
    }

    // ── Entry as of ───────────────────────────────────────────────────────────

    #[test]
    fn test_entry_as_of() {
        let discovery = discovery();
        let a = EntryId::from("A");

        let earlier = discovery.entry_as_of(&a, Some(at(150))).unwrap().unwrap();
        assert_eq!(earlier.content, "Rates unchanged");

        let now = discovery.entry_as_of(&a, None).unwrap().unwrap();
        assert_eq!(now.status, EntryStatus::Deleted);

        assert!(discovery.entry_as_of(&EntryId::from("B"), Some(at(150))).unwrap().is_none());
        assert!(matches!(
            discovery.entry_as_of(&EntryId::from("Z"), None),
            Err(LedgerError::EntryNotFound { .. })
        ));
    }

    // ── Config ────────────────────────────────────────────────────────────────

    #[test]
    fn test_config_defaults_when_empty() {
        let config = PalimpsestConfig::from_toml_str("").unwrap();
        assert_eq!(config.discovery.system_actor, "system");
        assert_eq!(config.discovery.max_entries, 100_000);
        assert!(config.ledger.journal_path.is_none());
    }

    #[test]
    fn test_config_parses_sections() {
        let toml = r#"
            [ledger]
            journal_path = "var/ledger.jsonl"

            [discovery]
            system_actor = "palimpsest"
            signing_key = "s3cret"
            max_entries = 10
        "#;
        let config = PalimpsestConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.discovery.system_actor, "palimpsest");
        assert_eq!(config.discovery.max_entries, 10);
        assert_eq!(
            config.ledger.journal_path.as_deref(),
            Some(std::path::Path::new("var/ledger.jsonl"))
        );
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(matches!(
            PalimpsestConfig::from_toml_str("[discovery]\nmax_entries = 0"),
            Err(LedgerError::Config { .. })
        ));
        assert!(matches!(
            PalimpsestConfig::from_toml_str("[discovery\n"),
            Err(LedgerError::Config { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("palimpsest.toml");
        std::fs::write(&path, "[discovery]\nsystem_actor = \"archivist\"\n").unwrap();

        let config = PalimpsestConfig::from_file(&path).unwrap();
        assert_eq!(config.discovery.system_actor, "archivist");

        let missing = PalimpsestConfig::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(LedgerError::Config { .. })));
    }
}
