//! The in-memory ledger store and modification recorder.
//!
//! `InMemoryLedger` keeps every entry behind one `RwLock`. Writers take the
//! write lock for the whole create/record operation, so a record's append and
//! the entry's current-state update are observed together or not at all.
//! Readers clone under the read lock and never see a half-applied change.
//!
//! When a journal is attached, each write is journaled under the same lock
//! before memory is mutated. Observers run after the lock is released.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use palimpsest_contracts::{
    entry::{ChangeType, EntryId, LedgerEntry, ModificationRecord},
    error::{LedgerError, LedgerResult},
};
use palimpsest_core::{
    diff,
    traits::{Clock, ContentHasher, LedgerEvent, LedgerObserver},
};

use crate::{
    chain::{verify_entry, ChainVerification},
    journal::{read_journal, FileJournal, JournalRecord, JournalSink},
};

// ── Requests ──────────────────────────────────────────────────────────────────

/// Arguments for `InMemoryLedger::create_entry`.
#[derive(Debug, Clone)]
pub struct NewEntry {
    /// Explicit id. Generated when `None`.
    pub id: Option<EntryId>,
    pub content: String,
    pub author: String,
    pub external_ref: Option<String>,
}

impl NewEntry {
    pub fn new(content: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            author: author.into(),
            external_ref: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(EntryId(id.into()));
        self
    }

    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

// ── Internal state ────────────────────────────────────────────────────────────

/// The lock-protected interior of an `InMemoryLedger`.
#[derive(Default)]
pub(crate) struct LedgerState {
    /// Entries in creation order.
    pub(crate) entries: Vec<LedgerEntry>,
    /// Position of each entry in `entries`.
    pub(crate) index: HashMap<EntryId, usize>,
}

impl LedgerState {
    fn get(&self, id: &EntryId) -> Option<&LedgerEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    fn get_mut(&mut self, id: &EntryId) -> Option<&mut LedgerEntry> {
        match self.index.get(id) {
            Some(&i) => Some(&mut self.entries[i]),
            None => None,
        }
    }

    fn insert(&mut self, entry: LedgerEntry) {
        self.index.insert(entry.id.clone(), self.entries.len());
        self.entries.push(entry);
    }

    /// Apply a journal record without re-journaling it.
    fn apply(&mut self, record: JournalRecord) -> LedgerResult<()> {
        match record {
            JournalRecord::EntryCreated {
                entry_id,
                author,
                created_at,
                content,
                digest,
                external_ref,
            } => {
                if self.index.contains_key(&entry_id) {
                    return Err(LedgerError::DuplicateId { entry_id: entry_id.0 });
                }
                self.insert(LedgerEntry {
                    id: entry_id,
                    author,
                    created_at,
                    original_content: content.clone(),
                    original_digest: digest,
                    current_content: content,
                    current_digest: digest,
                    modifications: Vec::new(),
                    external_ref,
                });
            }
            JournalRecord::ModificationRecorded { entry_id, record } => {
                let entry = self
                    .get_mut(&entry_id)
                    .ok_or_else(|| LedgerError::EntryNotFound { entry_id: entry_id.0.clone() })?;
                // Replayed as-is. A tampered record stays in history for
                // verify_chain to find.
                entry.current_content = record.new_content.clone();
                entry.current_digest = record.new_digest;
                entry.modifications.push(record);
            }
        }
        Ok(())
    }
}

// ── Public store ──────────────────────────────────────────────────────────────

/// An append-only, hash-chained store of ledger entries.
///
/// Construct one per application and share it by `Arc`. There is no global
/// instance.
pub struct InMemoryLedger {
    pub(crate) state: RwLock<LedgerState>,
    hasher: Arc<dyn ContentHasher>,
    clock: Arc<dyn Clock>,
    journal: Option<Box<dyn JournalSink>>,
    observers: RwLock<Vec<(SubscriptionId, Arc<dyn LedgerObserver>)>>,
    next_subscription: AtomicU64,
}

impl InMemoryLedger {
    /// Create an empty, unjournaled ledger.
    pub fn new(hasher: Arc<dyn ContentHasher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            hasher,
            clock,
            journal: None,
            observers: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
        }
    }

    /// Attach a journal. Subsequent writes are appended to it.
    pub fn with_journal(mut self, journal: Box<dyn JournalSink>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Rebuild a ledger by replaying `records` in order.
    ///
    /// Records are applied exactly as stored; integrity is checked separately
    /// with `verify_chain`. Fails on a duplicate creation or a modification
    /// for an unknown entry.
    pub fn restore(
        records: impl IntoIterator<Item = JournalRecord>,
        hasher: Arc<dyn ContentHasher>,
        clock: Arc<dyn Clock>,
    ) -> LedgerResult<Self> {
        let ledger = Self::new(hasher, clock);
        {
            let mut state = ledger.write_state()?;
            let mut applied = 0usize;
            for record in records {
                state.apply(record)?;
                applied += 1;
            }
            info!(records = applied, entries = state.entries.len(), "ledger restored");
        }
        Ok(ledger)
    }

    /// Restore from the journal at `path` (if it exists) and keep appending to it.
    pub fn open_journaled(
        path: impl AsRef<Path>,
        hasher: Arc<dyn ContentHasher>,
        clock: Arc<dyn Clock>,
    ) -> LedgerResult<Self> {
        let path = path.as_ref();
        let records = if path.exists() { read_journal(path)? } else { Vec::new() };
        let journal = FileJournal::open(path)?;
        Ok(Self::restore(records, hasher, clock)?.with_journal(Box::new(journal)))
    }

    pub fn hasher(&self) -> &dyn ContentHasher {
        self.hasher.as_ref()
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    /// Start tracking a new content item.
    ///
    /// Returns `DuplicateId` if an explicit id is already in use and
    /// `Validation` if the author or explicit id is empty.
    pub fn create_entry(&self, new: NewEntry) -> LedgerResult<LedgerEntry> {
        if new.author.trim().is_empty() {
            return Err(LedgerError::Validation { reason: "author must not be empty".to_string() });
        }
        if matches!(&new.id, Some(id) if id.0.trim().is_empty()) {
            return Err(LedgerError::Validation { reason: "entry id must not be empty".to_string() });
        }

        let digest = self.hasher.digest_str(&new.content);

        let entry = {
            let mut state = self.write_state()?;

            let id = match new.id {
                Some(id) if state.index.contains_key(&id) => {
                    return Err(LedgerError::DuplicateId { entry_id: id.0 });
                }
                Some(id) => id,
                None => EntryId::generate(),
            };

            let entry = LedgerEntry {
                id,
                author: new.author,
                created_at: self.clock.now(),
                original_content: new.content.clone(),
                original_digest: digest,
                current_content: new.content,
                current_digest: digest,
                modifications: Vec::new(),
                external_ref: new.external_ref,
            };

            if let Some(journal) = &self.journal {
                journal.append(&JournalRecord::created(&entry))?;
            }
            state.insert(entry.clone());
            entry
        };

        info!(
            entry_id = %entry.id,
            author = %entry.author,
            digest = %entry.original_digest.short(),
            "entry created"
        );

        self.notify(&LedgerEvent::EntryCreated {
            entry_id: entry.id.clone(),
            digest: entry.original_digest,
            at: entry.created_at,
        });

        Ok(entry)
    }

    /// Append a modification to `entry_id` and make `new_content` current.
    ///
    /// The new record links to the entry's current digest. Returns
    /// `EntryNotFound` for an unknown id and `Validation` if the clock reads
    /// earlier than the entry's last change.
    pub fn record_modification(
        &self,
        entry_id: &EntryId,
        new_content: impl Into<String>,
        change_type: ChangeType,
        external_ref: Option<String>,
    ) -> LedgerResult<ModificationRecord> {
        let new_content = new_content.into();
        let new_digest = self.hasher.digest_str(&new_content);

        let record = {
            let mut state = self.write_state()?;
            let entry = state
                .get_mut(entry_id)
                .ok_or_else(|| LedgerError::EntryNotFound { entry_id: entry_id.0.clone() })?;

            let timestamp = self.clock.now();
            let last_changed = entry.last_changed_at();
            if timestamp < last_changed {
                return Err(LedgerError::Validation {
                    reason: format!(
                        "modification at {} precedes last change of '{}' at {}",
                        timestamp, entry_id, last_changed
                    ),
                });
            }

            let record = ModificationRecord {
                id: entry.modifications.len() as u64,
                timestamp,
                previous_digest: entry.current_digest,
                new_digest,
                diff_summary: diff(&entry.current_content, &new_content),
                new_content,
                change_type,
                external_ref,
            };

            if let Some(journal) = &self.journal {
                journal.append(&JournalRecord::ModificationRecorded {
                    entry_id: entry_id.clone(),
                    record: record.clone(),
                })?;
            }

            entry.modifications.push(record.clone());
            entry.current_content = record.new_content.clone();
            entry.current_digest = record.new_digest;
            record
        };

        info!(
            entry_id = %entry_id,
            modification_id = record.id,
            change_type = %record.change_type,
            new_digest = %record.new_digest.short(),
            diff = %record.diff_summary,
            "modification recorded"
        );

        self.notify(&LedgerEvent::ModificationRecorded {
            entry_id: entry_id.clone(),
            modification_id: record.id,
            change_type: record.change_type,
            new_digest: record.new_digest,
            at: record.timestamp,
        });

        Ok(record)
    }

    /// Block until the attached journal (if any) is durable.
    pub fn flush(&self) -> LedgerResult<()> {
        match &self.journal {
            Some(journal) => journal.flush(),
            None => Ok(()),
        }
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    pub fn get_entry(&self, id: &EntryId) -> LedgerResult<Option<LedgerEntry>> {
        Ok(self.read_state()?.get(id).cloned())
    }

    /// A copy of every entry, in creation order.
    pub fn list_entries(&self) -> LedgerResult<Vec<LedgerEntry>> {
        Ok(self.read_state()?.entries.clone())
    }

    pub fn len(&self) -> LedgerResult<usize> {
        Ok(self.read_state()?.entries.len())
    }

    pub fn is_empty(&self) -> LedgerResult<bool> {
        Ok(self.len()? == 0)
    }

    /// The journal records that would rebuild the current store, in order.
    ///
    /// Each entry's creation is followed by its modifications; relative order
    /// across entries is by creation.
    pub fn export_records(&self) -> LedgerResult<Vec<JournalRecord>> {
        let state = self.read_state()?;
        let mut records = Vec::new();
        for entry in &state.entries {
            records.push(JournalRecord::created(entry));
            records.extend(entry.modifications.iter().map(|m| JournalRecord::ModificationRecorded {
                entry_id: entry.id.clone(),
                record: m.clone(),
            }));
        }
        Ok(records)
    }

    // ── Verification ──────────────────────────────────────────────────────────

    /// Check the hash chain of one entry.
    pub fn verify_chain(&self, entry_id: &EntryId) -> LedgerResult<ChainVerification> {
        let state = self.read_state()?;
        let entry = state
            .get(entry_id)
            .ok_or_else(|| LedgerError::EntryNotFound { entry_id: entry_id.0.clone() })?;

        let verification = verify_entry(entry, self.hasher.as_ref());
        if verification.valid {
            debug!(entry_id = %entry_id, records = entry.modifications.len(), "hash chain verified");
        } else {
            warn!(
                entry_id = %entry_id,
                broken_at = ?verification.broken_at,
                fault = ?verification.fault,
                "hash chain broken"
            );
        }
        Ok(verification)
    }

    /// Like `verify_chain`, but a broken chain is an error.
    pub fn ensure_chain(&self, entry_id: &EntryId) -> LedgerResult<()> {
        let verification = self.verify_chain(entry_id)?;
        if verification.valid {
            Ok(())
        } else {
            Err(LedgerError::ChainIntegrity {
                entry_id: entry_id.0.clone(),
                index: verification.broken_at,
            })
        }
    }

    /// Verify every entry, in creation order.
    pub fn verify_all(&self) -> LedgerResult<Vec<(EntryId, ChainVerification)>> {
        let state = self.read_state()?;
        let results: Vec<_> = state
            .entries
            .iter()
            .map(|e| (e.id.clone(), verify_entry(e, self.hasher.as_ref())))
            .collect();

        let broken = results.iter().filter(|(_, v)| !v.valid).count();
        if broken > 0 {
            warn!(entries = results.len(), broken, "ledger verification found broken chains");
        }
        Ok(results)
    }

    // ── Subscriptions ─────────────────────────────────────────────────────────

    pub fn subscribe(&self, observer: Arc<dyn LedgerObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, observer));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write().unwrap_or_else(|e| e.into_inner());
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        observers.len() != before
    }

    fn notify(&self, event: &LedgerEvent) {
        // Clone the list so observers may subscribe/unsubscribe re-entrantly.
        let observers: Vec<Arc<dyn LedgerObserver>> = self
            .observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();

        for observer in observers {
            observer.on_event(event);
        }
    }

    // ── Lock helpers ──────────────────────────────────────────────────────────

    fn read_state(&self) -> LedgerResult<RwLockReadGuard<'_, LedgerState>> {
        self.state.read().map_err(|e| LedgerError::StoreUnavailable {
            reason: format!("ledger state lock poisoned: {}", e),
        })
    }

    fn write_state(&self) -> LedgerResult<RwLockWriteGuard<'_, LedgerState>> {
        self.state.write().map_err(|e| LedgerError::StoreUnavailable {
            reason: format!("ledger state lock poisoned: {}", e),
        })
    }
}
