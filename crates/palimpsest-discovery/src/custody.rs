//! Chain-of-custody records.
//!
//! Token layout:
//!   digest          = digest(canonical JSON of {report_id, timestamp, action, actor, proof_digest})
//!   signature_token = combine(digest(signing_key), digest)
//!
//! Anyone holding the signing key can recompute both values from the report.

use chrono::{DateTime, Utc};
use serde::Serialize;

use palimpsest_contracts::{
    error::{LedgerError, LedgerResult},
    hash::ContentHash,
    report::{CustodyAction, CustodyRecord, LegalReport, ReportId},
};
use palimpsest_core::traits::ContentHasher;

#[derive(Serialize)]
struct CustodyInput<'a> {
    report_id: &'a str,
    timestamp: &'a DateTime<Utc>,
    action: CustodyAction,
    actor: &'a str,
    proof_digest: &'a ContentHash,
}

fn custody_digest(
    hasher: &dyn ContentHasher,
    report_id: &ReportId,
    timestamp: &DateTime<Utc>,
    action: CustodyAction,
    actor: &str,
    proof_digest: &ContentHash,
) -> LedgerResult<ContentHash> {
    let input = CustodyInput {
        report_id: &report_id.0,
        timestamp,
        action,
        actor,
        proof_digest,
    };
    let bytes = serde_json::to_vec(&input).map_err(|e| LedgerError::ReportGeneration {
        reason: format!("failed to serialize custody record: {}", e),
    })?;
    Ok(hasher.digest(&bytes))
}

/// Build one signed custody record.
pub fn sign_custody(
    hasher: &dyn ContentHasher,
    signing_key: &str,
    report_id: &ReportId,
    proof_digest: &ContentHash,
    timestamp: DateTime<Utc>,
    action: CustodyAction,
    actor: &str,
) -> LedgerResult<CustodyRecord> {
    let digest = custody_digest(hasher, report_id, &timestamp, action, actor, proof_digest)?;
    let signature_token = hasher.combine(&hasher.digest_str(signing_key), &digest);
    Ok(CustodyRecord {
        timestamp,
        action,
        actor: actor.to_string(),
        digest,
        signature_token,
    })
}

/// Index of the first custody record whose digest or token does not
/// recompute, or `None` if the whole trail checks out.
pub fn first_invalid_custody(
    hasher: &dyn ContentHasher,
    signing_key: &str,
    report: &LegalReport,
) -> LedgerResult<Option<usize>> {
    let key = hasher.digest_str(signing_key);
    for (index, record) in report.chain_of_custody.iter().enumerate() {
        let digest = custody_digest(
            hasher,
            &report.id,
            &record.timestamp,
            record.action,
            &record.actor,
            &report.proof_digest,
        )?;
        if digest != record.digest || hasher.combine(&key, &digest) != record.signature_token {
            return Ok(Some(index));
        }
    }
    Ok(None)
}
