//! # palimpsest-snapshot
//!
//! Point-in-time reconstruction of the ledger, Merkle folding of the
//! reconstructed digests, and the local integrity seal that binds a
//! snapshot's root, cutoff, and entry count.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use palimpsest_snapshot::{build_snapshot, seal_snapshot, verify_seal};
//!
//! let snapshot = build_snapshot(&hasher, as_of, &ledger.list_entries()?, Utc::now());
//! let proof = seal_snapshot(&hasher, &snapshot)?;
//! assert!(verify_seal(&hasher, &snapshot, &proof)?);
//! ```

pub mod builder;
pub mod merkle;

pub use builder::{build_snapshot, reconstruct_entry};
pub use merkle::{merkle_proof, merkle_root, seal_snapshot, verify_proof, verify_seal, MerkleProof};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};

    use palimpsest_contracts::{
        entry::{ChangeType, EntryId, EntryStatus, LedgerEntry},
        hash::ContentHash,
        snapshot::SnapshotCounts,
    };
    use palimpsest_core::{traits::ContentHasher, ManualClock, Sha256Hasher};
    use palimpsest_ledger::{InMemoryLedger, NewEntry};

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn sealed() -> DateTime<Utc> {
        at(10_000)
    }

    fn rates_ledger() -> InMemoryLedger {
        rates_ledger_with_clock().0
    }

    /// The worked example: "A" created at 100, edited at 200, deleted at 300.
    fn rates_ledger_with_clock() -> (InMemoryLedger, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(at(100)));
        let ledger = InMemoryLedger::new(Arc::new(Sha256Hasher::new()), clock.clone());
        let a = ledger
            .create_entry(NewEntry::new("Rates unchanged", "desk1").with_id("A"))
            .unwrap();
        clock.set(at(200));
        ledger.record_modification(&a.id, "Rates cut 0.25%", ChangeType::Edit, None).unwrap();
        clock.set(at(300));
        ledger.record_modification(&a.id, "", ChangeType::Delete, None).unwrap();
        (ledger, clock)
    }

    fn entries(ledger: &InMemoryLedger) -> Vec<LedgerEntry> {
        ledger.list_entries().unwrap()
    }

    // ── Worked example ────────────────────────────────────────────────────────

    #[test]
    fn test_snapshot_before_edit_shows_original() {
        let ledger = rates_ledger();
        let snapshot = build_snapshot(&Sha256Hasher::new(), at(150), &entries(&ledger), sealed());

        let a = snapshot.entry(&EntryId::from("A")).unwrap();
        assert_eq!(a.content, "Rates unchanged");
        assert_eq!(a.status, EntryStatus::Active);
        assert_eq!(snapshot.counts.modified, 0);
        assert_eq!(snapshot.counts.total, 1);
    }

    #[test]
    fn test_snapshot_after_edit_shows_new_content() {
        let ledger = rates_ledger();
        let snapshot = build_snapshot(&Sha256Hasher::new(), at(250), &entries(&ledger), sealed());

        let a = snapshot.entry(&EntryId::from("A")).unwrap();
        assert_eq!(a.content, "Rates cut 0.25%");
        assert_eq!(a.last_modified_at, Some(at(200)));
        assert_eq!(snapshot.counts.modified, 1);
        assert_eq!(snapshot.counts.deleted, 0);
    }

    #[test]
    fn test_snapshot_after_delete_counts_deleted() {
        let ledger = rates_ledger();
        let snapshot = build_snapshot(&Sha256Hasher::new(), at(350), &entries(&ledger), sealed());

        assert_eq!(snapshot.counts.deleted, 1);
        assert_eq!(snapshot.counts.active, 0);
        assert_eq!(snapshot.entries[0].applied_modifications, 2);
    }

    /// A record timestamped exactly at the cutoff is included.
    #[test]
    fn test_cutoff_is_inclusive() {
        let ledger = rates_ledger();
        let snapshot = build_snapshot(&Sha256Hasher::new(), at(200), &entries(&ledger), sealed());
        assert_eq!(snapshot.entries[0].content, "Rates cut 0.25%");
    }

    // ── Properties ────────────────────────────────────────────────────────────

    #[test]
    fn test_empty_snapshot_before_any_entry() {
        let ledger = rates_ledger();
        let snapshot = build_snapshot(&Sha256Hasher::new(), at(50), &entries(&ledger), sealed());

        assert!(snapshot.entries.is_empty());
        assert_eq!(snapshot.counts, SnapshotCounts::default());
        assert_eq!(snapshot.merkle_root, ContentHash::EMPTY_SET);
    }

    /// `build_snapshot(now)` reproduces each entry's current content and digest.
    #[test]
    fn test_snapshot_at_now_matches_live_state() {
        let ledger = rates_ledger();
        let live = entries(&ledger);
        let snapshot = build_snapshot(&Sha256Hasher::new(), at(9_999), &live, sealed());

        for entry in &live {
            let reconstructed = snapshot.entry(&entry.id).unwrap();
            assert_eq!(reconstructed.content, entry.current_content);
            assert_eq!(reconstructed.digest, entry.current_digest);
        }
    }

    #[test]
    fn test_total_is_monotonic_in_time() {
        let clock = Arc::new(ManualClock::new(at(100)));
        let ledger = InMemoryLedger::new(Arc::new(Sha256Hasher::new()), clock.clone());
        for (i, t) in [100, 200, 300, 400].into_iter().enumerate() {
            clock.set(at(t));
            let e = ledger.create_entry(NewEntry::new(format!("post {}", i), "desk1")).unwrap();
            if i % 2 == 0 {
                clock.set(at(t + 50));
                ledger.record_modification(&e.id, "", ChangeType::Delete, None).unwrap();
            }
        }

        let hasher = Sha256Hasher::new();
        let all = entries(&ledger);
        let mut previous = 0;
        for t in (0..500).step_by(25) {
            let total = build_snapshot(&hasher, at(t), &all, sealed()).counts.total;
            assert!(total >= previous, "total dropped from {} to {} at t={}", previous, total, t);
            previous = total;
        }
        assert_eq!(previous, 4);
    }

    #[test]
    fn test_snapshot_is_deterministic_and_order_independent() {
        let clock = Arc::new(ManualClock::new(at(100)));
        let ledger = InMemoryLedger::new(Arc::new(Sha256Hasher::new()), clock.clone());
        for id in ["C", "A", "B"] {
            ledger.create_entry(NewEntry::new(format!("body {}", id), "desk1").with_id(id)).unwrap();
        }

        let hasher = Sha256Hasher::new();
        let mut all = entries(&ledger);
        let first = build_snapshot(&hasher, at(500), &all, at(1));
        let second = build_snapshot(&hasher, at(500), &all, at(2));
        all.reverse();
        let reversed = build_snapshot(&hasher, at(500), &all, at(3));

        assert_eq!(first.merkle_root, second.merkle_root);
        assert_eq!(first.merkle_root, reversed.merkle_root);
        let ids: Vec<&str> = first.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["A", "B", "C"], "same created_at sorts by id");
    }

    // ── Delete / restore policy ───────────────────────────────────────────────

    #[test]
    fn test_edit_after_delete_does_not_resurrect() {
        let (ledger, clock) = rates_ledger_with_clock();
        let id = EntryId::from("A");
        clock.set(at(400));
        ledger.record_modification(&id, "Rates cut 0.50%", ChangeType::Edit, None).unwrap();

        let hasher = Sha256Hasher::new();
        let snapshot = build_snapshot(&hasher, at(450), &entries(&ledger), sealed());
        let a = snapshot.entry(&id).unwrap();
        assert_eq!(a.status, EntryStatus::Deleted);
        assert_eq!(a.content, "Rates cut 0.50%", "content still follows the chain");

        clock.set(at(500));
        ledger.record_modification(&id, "Rates cut 0.50%", ChangeType::Restore, None).unwrap();
        let snapshot = build_snapshot(&hasher, at(500), &entries(&ledger), sealed());
        assert_eq!(snapshot.entry(&id).unwrap().status, EntryStatus::Active);
        assert_eq!(snapshot.counts.active, 1);
    }

    #[test]
    fn test_broken_chain_is_kept_but_not_verified() {
        let ledger = rates_ledger();
        let mut all = entries(&ledger);
        all[0].modifications[0].previous_digest = ContentHash::EMPTY_SET;

        let snapshot = build_snapshot(&Sha256Hasher::new(), at(350), &all, sealed());
        assert_eq!(snapshot.counts.total, 1);
        assert_eq!(snapshot.counts.verified, 0);
        assert!(!snapshot.entries[0].chain_valid);
    }

    // ── Merkle ────────────────────────────────────────────────────────────────

    fn leaves(n: usize) -> Vec<ContentHash> {
        let hasher = Sha256Hasher::new();
        (0..n).map(|i| hasher.digest_str(&format!("leaf {}", i))).collect()
    }

    #[test]
    fn test_merkle_root_of_single_leaf_is_the_leaf() {
        let l = leaves(1);
        assert_eq!(merkle_root(&Sha256Hasher::new(), &l), l[0]);
    }

    #[test]
    fn test_merkle_root_duplicates_last_on_odd_levels() {
        let h = Sha256Hasher::new();
        let l = leaves(3);
        let expected = h.combine(&h.combine(&l[0], &l[1]), &h.combine(&l[2], &l[2]));
        assert_eq!(merkle_root(&h, &l), expected);
    }

    #[test]
    fn test_merkle_root_is_order_sensitive() {
        let h = Sha256Hasher::new();
        let mut l = leaves(4);
        let root = merkle_root(&h, &l);
        l.swap(0, 1);
        assert_ne!(merkle_root(&h, &l), root);
    }

    #[test]
    fn test_merkle_proofs_verify_for_every_leaf() {
        let h = Sha256Hasher::new();
        for n in [1, 2, 3, 5, 8] {
            let l = leaves(n);
            let root = merkle_root(&h, &l);
            for (i, leaf) in l.iter().enumerate() {
                let proof = merkle_proof(&h, &l, i).unwrap();
                assert!(verify_proof(&h, &root, leaf, &proof), "leaf {} of {}", i, n);
            }
            assert!(merkle_proof(&h, &l, n).is_none());
        }
    }

    #[test]
    fn test_merkle_proof_rejects_wrong_leaf() {
        let h = Sha256Hasher::new();
        let l = leaves(4);
        let root = merkle_root(&h, &l);
        let proof = merkle_proof(&h, &l, 2).unwrap();
        assert!(!verify_proof(&h, &root, &l[3], &proof));
    }

    // ── Seal ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_seal_verifies_and_detects_alteration() {
        let h = Sha256Hasher::new();
        let ledger = rates_ledger();
        let snapshot = build_snapshot(&h, at(250), &entries(&ledger), sealed());
        let proof = seal_snapshot(&h, &snapshot).unwrap();

        assert!(verify_seal(&h, &snapshot, &proof).unwrap());

        let mut altered = snapshot.clone();
        altered.entries[0].digest = h.digest_str("Rates unchanged");
        assert!(!verify_seal(&h, &altered, &proof).unwrap(), "changed entry digest");

        let mut moved = snapshot.clone();
        moved.as_of = at(260);
        assert!(!verify_seal(&h, &moved, &proof).unwrap(), "changed cutoff");
    }

    /// Rewriting an entry after sealing fails even if its digest is left alone.
    #[test]
    fn test_seal_detects_rewritten_content_and_status() {
        let h = Sha256Hasher::new();
        let ledger = rates_ledger();
        let snapshot = build_snapshot(&h, at(250), &entries(&ledger), sealed());
        let proof = seal_snapshot(&h, &snapshot).unwrap();

        let mut rewritten = snapshot.clone();
        rewritten.entries[0].content = "Rates raised 5%".into();
        assert!(!verify_seal(&h, &rewritten, &proof).unwrap(), "content no longer matches digest");

        let mut hidden = snapshot.clone();
        hidden.entries[0].status = EntryStatus::Deleted;
        assert!(!verify_seal(&h, &hidden, &proof).unwrap(), "counts no longer match entries");
    }

    /// The seal does not depend on when the snapshot was produced.
    #[test]
    fn test_seal_ignores_sealed_at() {
        let h = Sha256Hasher::new();
        let ledger = rates_ledger();
        let a = build_snapshot(&h, at(250), &entries(&ledger), at(1));
        let b = build_snapshot(&h, at(250), &entries(&ledger), at(2));
        assert_eq!(seal_snapshot(&h, &a).unwrap(), seal_snapshot(&h, &b).unwrap());
    }
}
