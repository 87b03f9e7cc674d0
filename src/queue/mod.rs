// src/queue/mod.rs
// FIFO buffer of accepted, ready-to-post candidates.

use std::collections::VecDeque;

use anyhow::Result;
use tracing::info;

use crate::corpus::{strip_quotes, Corpus};
use crate::engine::{GenerationEngine, BATCH_TARGET, END_DELIMITER, START_DELIMITER};
use crate::filter::PolicyFilter;

/// A generated text sample plus its normalized comparison form. Immutable
/// once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    text: String,
    normalized: String,
}

impl Candidate {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let normalized = strip_quotes(text.trim());
        Self { text, normalized }
    }

    /// The raw text as generated, ready for dispatch.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Quote-stripped, whitespace-trimmed form used for duplicate checks.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

/// Ordered buffer of accepted candidates, refilled from the generation
/// engine only when empty at the start of a fetch.
#[derive(Default)]
pub struct CandidateQueue {
    items: VecDeque<Candidate>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Pop the head candidate, running one refill cycle first if the queue
    /// is empty. Returns `None` only when a refill accepted zero items;
    /// the caller treats that as "nothing to send this cycle".
    pub async fn pop_or_refill(
        &mut self,
        engine: &mut GenerationEngine,
        filter: &PolicyFilter,
        corpus: &Corpus,
    ) -> Result<Option<Candidate>> {
        if self.items.is_empty() {
            self.refill(engine, filter, corpus).await?;
        }
        Ok(self.items.pop_front())
    }

    /// One refill cycle: generate a batch of the fixed target size, strip
    /// delimiter text, keep what the policy filter accepts, in generation
    /// order. The batch may legitimately shrink below target.
    async fn refill(
        &mut self,
        engine: &mut GenerationEngine,
        filter: &PolicyFilter,
        corpus: &Corpus,
    ) -> Result<()> {
        let batch = engine.generate_batch(BATCH_TARGET).await?;
        for raw in batch {
            let text = raw.replace(START_DELIMITER, "").replace(END_DELIMITER, "");
            let candidate = Candidate::new(text);
            if filter.accept(&candidate, corpus).await {
                self.items.push_back(candidate);
            }
        }
        info!("Queue refilled: {} of {} candidates accepted", self.items.len(), BATCH_TARGET);
        Ok(())
    }
}
