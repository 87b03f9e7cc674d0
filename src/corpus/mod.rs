// src/corpus/mod.rs
// Persisted history corpus: training data for the model runtime and the
// reference set for duplicate detection.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

pub mod collect;

/// Header row written at the top of every corpus file.
pub const CORPUS_HEADER: &str = "Tweets";

/// In-memory view of the per-identity corpus file. Loaded once at startup,
/// read-only afterwards; only the one-time collection path appends to the
/// underlying file.
pub struct Corpus {
    lines: Vec<String>,
}

impl Corpus {
    /// Load the corpus from its line-oriented file, skipping the header row.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read corpus file {}", path.display()))?;

        let lines: Vec<String> = raw
            .lines()
            .skip(1) // header row
            .filter(|line| !line.is_empty())
            .map(|line| line.to_string())
            .collect();

        info!("Loaded corpus: {} lines from {}", lines.len(), path.display());
        Ok(Self { lines })
    }

    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// True if the quote-stripped `text` occurs inside any quote-stripped
    /// corpus line. The match is deliberately one-directional and
    /// case-sensitive: a generated fragment of a historical line counts as
    /// a duplicate, a superset of one does not.
    pub fn contains_fragment(&self, text: &str) -> bool {
        let needle = strip_quotes(text);
        self.lines
            .iter()
            .any(|line| strip_quotes(line).contains(&needle))
    }
}

/// Remove every double-quote character, the normalization applied to both
/// sides of the duplicate check.
pub fn strip_quotes(text: &str) -> String {
    text.replace('"', "")
}
