// src/filter/mod.rs
// Content policy checks applied to every generated candidate before it can
// be queued for posting.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, info};

use crate::corpus::Corpus;
use crate::queue::Candidate;

pub mod probe;

use probe::LinkProbe;

// Loose URL shape: any whitespace-delimited token with an interior dot.
static LINKISH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+\.\S+").expect("valid regex"));

/// Pure-predicate gate for candidates: duplicate-of-corpus, blocked-term,
/// and live-link checks. A candidate must clear all three.
pub struct PolicyFilter {
    blocked: Vec<String>,
    probe: Box<dyn LinkProbe>,
}

impl PolicyFilter {
    pub fn new(blocked: Vec<String>, probe: Box<dyn LinkProbe>) -> Self {
        Self { blocked, probe }
    }

    /// Load blocked terms, one per line, lowercased. A missing path or an
    /// unreadable file disables the check rather than failing startup.
    pub fn load_block_list(path: Option<&Path>) -> Vec<String> {
        let Some(path) = path else {
            info!("No block list path provided, continuing with no blocked terms");
            return Vec::new();
        };

        match fs::read_to_string(path) {
            Ok(raw) => {
                let terms: Vec<String> = raw
                    .lines()
                    .map(|line| line.trim_end().to_lowercase())
                    .filter(|line| !line.is_empty())
                    .collect();
                info!("Loaded {} blocked terms from {}", terms.len(), path.display());
                terms
            }
            Err(_) => {
                error!("Block list path not found, continuing with no blocked terms");
                Vec::new()
            }
        }
    }

    /// True iff the candidate passes every policy check.
    pub async fn accept(&self, candidate: &Candidate, corpus: &Corpus) -> bool {
        !corpus.contains_fragment(candidate.normalized())
            && !self.is_blocked(candidate.text())
            && !self.has_live_link(candidate.text()).await
    }

    fn is_blocked(&self, text: &str) -> bool {
        if self.blocked.is_empty() {
            return false;
        }
        let low = text.to_lowercase();
        self.blocked.iter().any(|term| low.contains(term.as_str()))
    }

    /// True if any link-shaped token resolves to a reachable resource.
    /// Performs no network traffic when the text contains no such token.
    async fn has_live_link(&self, text: &str) -> bool {
        for token in LINKISH.find_iter(text) {
            let mut address = token.as_str().to_string();
            if !address.starts_with("http") {
                address = format!("https://{}", address);
            }
            if self.probe.is_reachable(&address).await {
                return true;
            }
        }
        false
    }
}
