//! Binary Merkle folding and the local integrity seal.
//!
//! Tree construction:
//!   - Leaves: the entries' reconstructed digests, used as-is
//!   - Internal nodes: combine(left, right)
//!   - Odd level: the last node is paired with itself
//!   - Empty input: `ContentHash::EMPTY_SET`
//!
//! The seal is `digest(canonical JSON of {merkle_root, as_of, total})`. It lets
//! a verifier confirm a snapshot was not altered after sealing. It does not
//! anchor anything on a blockchain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use palimpsest_contracts::{
    error::{LedgerError, LedgerResult},
    hash::ContentHash,
    snapshot::Snapshot,
};
use palimpsest_core::traits::ContentHasher;

use crate::builder::tally;

/// Which side of the path node a sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// One sibling on the path from a leaf to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofNode {
    pub side: Side,
    pub hash: ContentHash,
}

/// Inclusion proof for one leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: usize,
    /// Siblings from the leaf level up to (not including) the root.
    pub path: Vec<ProofNode>,
}

/// All levels of the tree; `levels[0]` are the leaves, the last level is the root.
fn build_levels(hasher: &dyn ContentHasher, leaves: &[ContentHash]) -> Vec<Vec<ContentHash>> {
    let mut levels = vec![leaves.to_vec()];

    while let Some(current) = levels.last().filter(|l| l.len() > 1) {
        let next: Vec<ContentHash> = current
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hasher.combine(left, right),
                [last] => hasher.combine(last, last),
                _ => unreachable!("chunks(2) yields one or two items"),
            })
            .collect();
        levels.push(next);
    }

    levels
}

/// Fold `leaves` into a single root digest.
pub fn merkle_root(hasher: &dyn ContentHasher, leaves: &[ContentHash]) -> ContentHash {
    if leaves.is_empty() {
        return ContentHash::EMPTY_SET;
    }
    build_levels(hasher, leaves)
        .last()
        .and_then(|level| level.first())
        .copied()
        .unwrap_or(ContentHash::EMPTY_SET)
}

/// Inclusion proof for `leaves[leaf_index]`, or `None` if out of range.
pub fn merkle_proof(
    hasher: &dyn ContentHasher,
    leaves: &[ContentHash],
    leaf_index: usize,
) -> Option<MerkleProof> {
    if leaf_index >= leaves.len() {
        return None;
    }

    let levels = build_levels(hasher, leaves);
    let mut path = Vec::with_capacity(levels.len().saturating_sub(1));
    let mut idx = leaf_index;

    for level in &levels[..levels.len() - 1] {
        let (sibling, side) = if idx % 2 == 0 {
            // A missing right sibling is the duplicated node itself.
            ((idx + 1).min(level.len() - 1), Side::Right)
        } else {
            (idx - 1, Side::Left)
        };
        path.push(ProofNode { side, hash: level[sibling] });
        idx /= 2;
    }

    Some(MerkleProof { leaf_index, path })
}

/// Check that `leaf` is included under `root` via `proof`.
pub fn verify_proof(
    hasher: &dyn ContentHasher,
    root: &ContentHash,
    leaf: &ContentHash,
    proof: &MerkleProof,
) -> bool {
    let computed = proof.path.iter().fold(*leaf, |current, node| match node.side {
        Side::Left => hasher.combine(&node.hash, &current),
        Side::Right => hasher.combine(&current, &node.hash),
    });
    &computed == root
}

/// Fields bound by the seal, in serialization order.
#[derive(Serialize)]
struct SealInput<'a> {
    merkle_root: &'a ContentHash,
    as_of: &'a DateTime<Utc>,
    total: usize,
}

/// Compute the local integrity seal of `snapshot`.
pub fn seal_snapshot(hasher: &dyn ContentHasher, snapshot: &Snapshot) -> LedgerResult<ContentHash> {
    let input = SealInput {
        merkle_root: &snapshot.merkle_root,
        as_of: &snapshot.as_of,
        total: snapshot.counts.total,
    };
    let bytes = serde_json::to_vec(&input).map_err(|e| LedgerError::ReportGeneration {
        reason: format!("failed to serialize seal input: {}", e),
    })?;
    Ok(hasher.digest(&bytes))
}

/// Recompute the Merkle root from `snapshot.entries` and the seal from the
/// result. True only if both match what the snapshot and `proof_digest` claim.
///
/// Each entry's digest must also match its content, and the stored counts
/// must match the entries, so a rewritten content or status fails.
pub fn verify_seal(
    hasher: &dyn ContentHasher,
    snapshot: &Snapshot,
    proof_digest: &ContentHash,
) -> LedgerResult<bool> {
    if let Some(entry) = snapshot.entries.iter().find(|e| hasher.digest_str(&e.content) != e.digest) {
        debug!(entry_id = %entry.id, "snapshot entry content does not match its digest");
        return Ok(false);
    }
    if tally(&snapshot.entries) != snapshot.counts {
        debug!(as_of = %snapshot.as_of, "snapshot counts do not match its entries");
        return Ok(false);
    }

    let leaves: Vec<ContentHash> = snapshot.entries.iter().map(|e| e.digest).collect();
    if merkle_root(hasher, &leaves) != snapshot.merkle_root {
        return Ok(false);
    }
    Ok(&seal_snapshot(hasher, snapshot)? == proof_digest)
}
