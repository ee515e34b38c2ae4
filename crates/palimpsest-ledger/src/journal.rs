//! Append-only write-ahead journal.
//!
//! The journal is a JSON Lines file with one `JournalRecord` per line, in
//! the exact order the store applied them. Replaying it rebuilds every entry
//! with its full history, so the file is the source of truth and the
//! in-memory store is a cache over it.
//!
//! `FileJournal` hands lines to a dedicated writer thread. The store enqueues
//! under its write lock, so line order matches append order, while the disk
//! write happens off the caller's path. `flush()` blocks until everything
//! queued so far is on disk.
//!
//! The first I/O error poisons the journal: every later append and flush
//! fails, so a gap in the file is never followed by lines that look good.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use palimpsest_contracts::{
    entry::{EntryId, LedgerEntry, ModificationRecord},
    error::{LedgerError, LedgerResult},
    hash::ContentHash,
};

/// One line of the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalRecord {
    EntryCreated {
        entry_id: EntryId,
        author: String,
        created_at: DateTime<Utc>,
        content: String,
        digest: ContentHash,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        external_ref: Option<String>,
    },
    ModificationRecorded {
        entry_id: EntryId,
        record: ModificationRecord,
    },
}

impl JournalRecord {
    /// The creation record for `entry`, ignoring its modifications.
    pub fn created(entry: &LedgerEntry) -> Self {
        JournalRecord::EntryCreated {
            entry_id: entry.id.clone(),
            author: entry.author.clone(),
            created_at: entry.created_at,
            content: entry.original_content.clone(),
            digest: entry.original_digest,
            external_ref: entry.external_ref.clone(),
        }
    }
}

/// Destination for journal records.
///
/// `append` is called while the store holds its write lock; a failed append
/// aborts the write before memory is touched.
pub trait JournalSink: Send + Sync {
    fn append(&self, record: &JournalRecord) -> LedgerResult<()>;

    /// Block until every appended record is durable.
    fn flush(&self) -> LedgerResult<()>;
}

enum Command {
    Append(String),
    Flush(Sender<io::Result<()>>),
}

/// A `JournalSink` backed by a JSON Lines file and a writer thread.
pub struct FileJournal {
    path: PathBuf,
    tx: Mutex<Option<Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Set by the writer on its first I/O error. Never cleared.
    failed: Arc<AtomicBool>,
}

impl FileJournal {
    /// Open (or create) the journal at `path` for appending.
    ///
    /// The file is opened on the calling thread so that permission and path
    /// errors surface here rather than on the first write.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LedgerError::Journal {
                reason: format!("failed to open journal '{}': {}", path.display(), e),
            })?;

        let (tx, rx) = mpsc::channel();
        let worker_path = path.clone();
        let failed = Arc::new(AtomicBool::new(false));
        let worker_failed = Arc::clone(&failed);
        let worker = thread::Builder::new()
            .name("palimpsest-journal".to_string())
            .spawn(move || run_writer(file, rx, worker_path, worker_failed))
            .map_err(|e| LedgerError::Journal {
                reason: format!("failed to start journal writer: {}", e),
            })?;

        info!(path = %path.display(), "journal opened");

        Ok(Self {
            path,
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            failed,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn send(&self, command: Command) -> LedgerResult<()> {
        let guard = self.tx.lock().map_err(|e| LedgerError::Journal {
            reason: format!("journal sender lock poisoned: {}", e),
        })?;
        let tx = guard.as_ref().ok_or_else(|| LedgerError::Journal {
            reason: "journal is closed".to_string(),
        })?;
        tx.send(command).map_err(|_| LedgerError::Journal {
            reason: "journal writer thread has stopped".to_string(),
        })
    }
}

impl JournalSink for FileJournal {
    fn append(&self, record: &JournalRecord) -> LedgerResult<()> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(LedgerError::Journal {
                reason: format!("journal '{}' failed an earlier write", self.path.display()),
            });
        }
        let line = serde_json::to_string(record).map_err(|e| LedgerError::Journal {
            reason: format!("failed to serialize journal record: {}", e),
        })?;
        self.send(Command::Append(line))
    }

    fn flush(&self) -> LedgerResult<()> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send(Command::Flush(reply_tx))?;

        let result = reply_rx.recv().map_err(|_| LedgerError::Journal {
            reason: "journal writer thread stopped before flushing".to_string(),
        })?;
        result.map_err(|e| LedgerError::Journal {
            reason: format!("failed to flush journal '{}': {}", self.path.display(), e),
        })
    }
}

impl Drop for FileJournal {
    fn drop(&mut self) {
        // Closing the channel lets the writer drain its queue and exit.
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
        if let Ok(mut worker) = self.worker.lock() {
            if let Some(handle) = worker.take() {
                let _ = handle.join();
            }
        }
    }
}

fn run_writer(file: File, rx: Receiver<Command>, path: PathBuf, failed: Arc<AtomicBool>) {
    let mut out = BufWriter::new(file);
    // First I/O error. Once set, nothing more is written.
    let mut failure: Option<(io::ErrorKind, String)> = None;

    let record_failure = |e: io::Error, failure: &mut Option<(io::ErrorKind, String)>| {
        error!(path = %path.display(), error = %e, "journal write failed; journal is now read-only");
        failed.store(true, Ordering::SeqCst);
        failure.get_or_insert((e.kind(), e.to_string()));
    };

    for command in rx {
        match command {
            Command::Append(line) => {
                if failure.is_some() {
                    continue;
                }
                if let Err(e) = writeln!(out, "{}", line) {
                    record_failure(e, &mut failure);
                }
            }
            Command::Flush(reply) => {
                if failure.is_none() {
                    if let Err(e) = out.flush().and_then(|_| out.get_ref().sync_data()) {
                        record_failure(e, &mut failure);
                    }
                }
                let result = match &failure {
                    Some((kind, message)) => Err(io::Error::new(*kind, message.clone())),
                    None => Ok(()),
                };
                debug!(path = %path.display(), ok = result.is_ok(), "journal flushed");
                let _ = reply.send(result);
            }
        }
    }

    if failure.is_none() {
        if let Err(e) = out.flush() {
            error!(path = %path.display(), error = %e, "final journal flush failed");
        }
    }
}

/// Read every record from the journal at `path`, in file order.
///
/// Blank lines are skipped. A line that does not parse fails the whole read:
/// a journal with an unreadable line cannot be replayed faithfully.
pub fn read_journal(path: impl AsRef<Path>) -> LedgerResult<Vec<JournalRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| LedgerError::Journal {
        reason: format!("failed to open journal '{}': {}", path.display(), e),
    })?;

    let mut records = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| LedgerError::Journal {
            reason: format!("failed to read '{}' line {}: {}", path.display(), number + 1, e),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| LedgerError::Journal {
            reason: format!("malformed record at '{}' line {}: {}", path.display(), number + 1, e),
        })?;
        records.push(record);
    }

    debug!(path = %path.display(), records = records.len(), "journal read");
    Ok(records)
}
