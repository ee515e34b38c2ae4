//! Word-level change summaries.
//!
//! The algorithm that produces a `DiffSummary` lives in `palimpsest-core`;
//! this module only defines the shape stored on every modification record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One positional word change between two versions of a text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WordChange {
    /// The word at `position` differs between the two versions.
    Changed { position: usize, before: String, after: String },
    /// The new version has a word at `position` the old one lacked.
    Added { position: usize, word: String },
    /// The old version had a word at `position` the new one lacks.
    Deleted { position: usize, word: String },
}

/// The list of word changes between two texts. Unchanged positions are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub changes: Vec<WordChange>,
}

impl DiffSummary {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of discrete changes.
    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    /// `(changed, added, deleted)` tallies.
    pub fn tally(&self) -> (usize, usize, usize) {
        self.changes.iter().fold((0, 0, 0), |(c, a, d), change| match change {
            WordChange::Changed { .. } => (c + 1, a, d),
            WordChange::Added { .. } => (c, a + 1, d),
            WordChange::Deleted { .. } => (c, a, d + 1),
        })
    }
}

fn words(n: usize) -> &'static str {
    if n == 1 {
        "word"
    } else {
        "words"
    }
}

impl fmt::Display for DiffSummary {
    /// One-line human-readable form, e.g. `2 words changed, 1 word added`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("no textual changes");
        }

        let (changed, added, deleted) = self.tally();
        let parts: Vec<String> = [(changed, "changed"), (added, "added"), (deleted, "removed")]
            .into_iter()
            .filter(|(n, _)| *n > 0)
            .map(|(n, verb)| format!("{} {} {}", n, words(n), verb))
            .collect();

        f.write_str(&parts.join(", "))
    }
}
