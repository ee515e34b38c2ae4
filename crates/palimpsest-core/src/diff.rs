//! Positional word-level diff.
//!
//! Both texts are split on whitespace and compared token by token by index.
//! This is not an edit-distance diff: inserting one word near the start
//! reports every following position as changed. The output is meant for a
//! one-line summary and a change count, not for patching.

use palimpsest_contracts::diff::{DiffSummary, WordChange};

/// Compute the word changes that turn `before` into `after`.
pub fn diff(before: &str, after: &str) -> DiffSummary {
    let old: Vec<&str> = before.split_whitespace().collect();
    let new: Vec<&str> = after.split_whitespace().collect();

    let mut changes = Vec::new();
    for position in 0..old.len().max(new.len()) {
        match (old.get(position), new.get(position)) {
            (Some(a), Some(b)) if a == b => {}
            (Some(a), Some(b)) => changes.push(WordChange::Changed {
                position,
                before: a.to_string(),
                after: b.to_string(),
            }),
            (None, Some(b)) => changes.push(WordChange::Added { position, word: b.to_string() }),
            (Some(a), None) => changes.push(WordChange::Deleted { position, word: a.to_string() }),
            (None, None) => unreachable!("position is below the longer token count"),
        }
    }

    DiffSummary { changes }
}
