//! Palimpsest: modification ledger demo CLI
//!
//! Runs the built-in walkthroughs, or drives a journal-backed ledger on disk.
//!
//! Usage:
//!   cargo run -p demo -- scenario
//!   cargo run -p demo -- tamper
//!   cargo run -p demo -- create --journal ledger.jsonl --id A --author desk1 --content "Rates unchanged"
//!   cargo run -p demo -- modify --journal ledger.jsonl --id A --change-type edit --content "Rates cut 0.25%"
//!   cargo run -p demo -- verify --journal ledger.jsonl
//!   cargo run -p demo -- report --journal ledger.jsonl --target-date 2024-03-01 \
//!       --requestor counsel --description "rate edits" --format csv

mod scenarios;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use palimpsest_contracts::{
    entry::{ChangeType, EntryId},
    error::{LedgerError, LedgerResult},
    report::{DiscoveryRequest, ExportFormat},
};
use palimpsest_core::{Sha256Hasher, SystemClock};
use palimpsest_discovery::{LegalDiscovery, PalimpsestConfig};
use palimpsest_ledger::{first_broken, InMemoryLedger, NewEntry};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Palimpsest: append-only, hash-chained modification ledger.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Palimpsest modification ledger demo",
    long_about = "Records content edits in a SHA-256 hash-chained ledger, reconstructs\n\
                  past states, and issues sealed legal discovery reports."
)]
struct Cli {
    /// TOML config file (ledger journal path, discovery settings).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk through create / edit / delete and point-in-time snapshots.
    Scenario,
    /// Corrupt a stored hash link and show that verification finds it.
    Tamper,
    /// Start tracking a new content item.
    Create {
        #[arg(long)]
        journal: Option<PathBuf>,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        author: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        external_ref: Option<String>,
    },
    /// Record an edit, delete, or restore.
    Modify {
        #[arg(long)]
        journal: Option<PathBuf>,
        #[arg(long)]
        id: String,
        #[arg(long, default_value = "edit")]
        change_type: String,
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long)]
        external_ref: Option<String>,
    },
    /// Verify every entry's hash chain.
    Verify {
        #[arg(long)]
        journal: Option<PathBuf>,
    },
    /// Issue a sealed legal discovery report and print it.
    Report {
        #[arg(long)]
        journal: Option<PathBuf>,
        /// RFC 3339 timestamp or YYYY-MM-DD (end of that UTC day).
        #[arg(long)]
        target_date: String,
        #[arg(long)]
        requestor: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        case_ref: Option<String>,
        #[arg(long, default_value = "json")]
        format: String,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Demo error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> LedgerResult<()> {
    let config = match &cli.config {
        Some(path) => PalimpsestConfig::from_file(path)?,
        None => PalimpsestConfig::default(),
    };

    match cli.command {
        Command::Scenario => scenarios::run_rates_scenario(),
        Command::Tamper => scenarios::run_tamper_scenario(),
        Command::Create { journal, id, author, content, external_ref } => {
            let ledger = open_ledger(journal.as_deref(), &config)?;
            let mut new = NewEntry::new(content, author);
            if let Some(id) = id {
                new = new.with_id(id);
            }
            if let Some(external_ref) = external_ref {
                new = new.with_external_ref(external_ref);
            }
            let entry = ledger.create_entry(new)?;
            ledger.flush()?;
            println!("{} {}", entry.id, entry.original_digest);
            Ok(())
        }
        Command::Modify { journal, id, change_type, content, external_ref } => {
            let ledger = open_ledger(journal.as_deref(), &config)?;
            let change_type: ChangeType = change_type.parse()?;
            let record = ledger.record_modification(&EntryId(id), content, change_type, external_ref)?;
            ledger.flush()?;
            println!("#{} {} {} ({})", record.id, record.change_type, record.new_digest, record.diff_summary);
            Ok(())
        }
        Command::Verify { journal } => {
            let ledger = open_ledger(journal.as_deref(), &config)?;
            let results = ledger.verify_all()?;
            for (id, verification) in &results {
                if verification.valid {
                    println!("ok      {}", id);
                } else {
                    println!(
                        "BROKEN  {}  at={:?} fault={:?}",
                        id, verification.broken_at, verification.fault
                    );
                }
            }
            first_broken(&results)
        }
        Command::Report { journal, target_date, requestor, description, case_ref, format } => {
            let format: ExportFormat = format.parse()?;
            let ledger = Arc::new(open_ledger(journal.as_deref(), &config)?);
            let discovery = LegalDiscovery::new(
                ledger,
                Arc::new(Sha256Hasher::new()),
                Arc::new(SystemClock),
                config.discovery.clone(),
            );
            let report = discovery.create_report(DiscoveryRequest {
                target_date,
                requestor: requestor.clone(),
                case_ref,
                description,
            })?;
            print!("{}", discovery.export_report(&report.id, format, &requestor)?);
            Ok(())
        }
    }
}

/// Open the journal named on the command line, falling back to the config.
fn open_ledger(journal: Option<&Path>, config: &PalimpsestConfig) -> LedgerResult<InMemoryLedger> {
    let path = journal
        .or(config.ledger.journal_path.as_deref())
        .ok_or_else(|| LedgerError::Config {
            reason: "no journal given: pass --journal or set ledger.journal_path".to_string(),
        })?;
    InMemoryLedger::open_journaled(path, Arc::new(Sha256Hasher::new()), Arc::new(SystemClock))
}
