//! TOML configuration for the discovery orchestrator.
//!
//! Example:
//! ```toml
//! [ledger]
//! journal_path = "var/ledger.jsonl"
//!
//! [discovery]
//! system_actor = "palimpsest"
//! signing_key = "change-me"
//! max_entries = 100000
//! ```
//!
//! Every key is optional; missing keys take the defaults below.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use palimpsest_contracts::error::{LedgerError, LedgerResult};

/// The top-level structure deserialized from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PalimpsestConfig {
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub discovery: DiscoverySettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Write-ahead journal. When absent the ledger is memory-only.
    pub journal_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Actor recorded on the `created` custody record.
    #[serde(default = "default_system_actor")]
    pub system_actor: String,

    /// Key mixed into every custody signature token.
    #[serde(default = "default_signing_key")]
    pub signing_key: String,

    /// Largest snapshot a report may contain. Larger requests fail with
    /// `ReportGeneration` instead of producing a partial report.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_system_actor() -> String {
    "system".to_string()
}

fn default_signing_key() -> String {
    "palimpsest-local-seal".to_string()
}

fn default_max_entries() -> usize {
    100_000
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            system_actor: default_system_actor(),
            signing_key: default_signing_key(),
            max_entries: default_max_entries(),
        }
    }
}

impl PalimpsestConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `LedgerError::Config` if the TOML is malformed or a value is
    /// out of range.
    pub fn from_toml_str(s: &str) -> LedgerResult<Self> {
        let config: PalimpsestConfig = toml::from_str(s).map_err(|e| LedgerError::Config {
            reason: format!("failed to parse config TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse the file at `path`.
    pub fn from_file(path: &Path) -> LedgerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| LedgerError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> LedgerResult<()> {
        let d = &self.discovery;
        if d.system_actor.trim().is_empty() {
            return Err(LedgerError::Config { reason: "discovery.system_actor must not be empty".into() });
        }
        if d.signing_key.is_empty() {
            return Err(LedgerError::Config { reason: "discovery.signing_key must not be empty".into() });
        }
        if d.max_entries == 0 {
            return Err(LedgerError::Config { reason: "discovery.max_entries must be at least 1".into() });
        }
        Ok(())
    }
}
