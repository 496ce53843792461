//! Mutable state threaded through one answer loop.

use crate::types::{Chunk, ChunkKey};
use std::collections::{HashMap, HashSet};

/// Per-question loop state. Owned by a single `answer_question` call.
#[derive(Debug, Clone)]
pub struct RoundState {
    /// Current round, starting at 1
    pub iteration: usize,

    /// Position in the text candidate pool
    pub text_cursor: usize,

    /// Position in the table candidate pool
    pub table_cursor: usize,

    /// Every (source, page) ever shown to the model, cited or not
    pub used_pages: HashSet<ChunkKey>,

    /// Times each source's neighbourhood has been widened
    pub expansion_steps: HashMap<String, u32>,

    /// Raw text of the last successful completion
    pub last_answer: String,

    /// Cited chunks in citation order, unique by (source, page)
    pub cited: Vec<Chunk>,

    /// Context budget for the next prompt, in estimated tokens
    pub context_budget: usize,
}

impl RoundState {
    pub fn new(context_budget: usize) -> Self {
        Self {
            iteration: 1,
            text_cursor: 0,
            table_cursor: 0,
            used_pages: HashSet::new(),
            expansion_steps: HashMap::new(),
            last_answer: String::new(),
            cited: Vec::new(),
            context_budget,
        }
    }

    pub fn is_used(&self, chunk: &Chunk) -> bool {
        self.used_pages.contains(&chunk.key())
    }

    /// Record chunks as shown.
    pub fn mark_used<'a>(&mut self, chunks: impl IntoIterator<Item = &'a Chunk>) {
        for chunk in chunks {
            self.used_pages.insert(chunk.key());
        }
    }

    /// Append newly cited chunks, skipping any (source, page) already cited.
    /// Returns how many were added.
    pub fn record_citations(&mut self, chunks: Vec<Chunk>) -> usize {
        let mut added = 0;
        for chunk in chunks {
            let key = chunk.key();
            if self.cited.iter().any(|c| c.key() == key) {
                continue;
            }
            self.used_pages.insert(key);
            self.cited.push(chunk);
            added += 1;
        }
        added
    }

    /// Move both cursors past one batch.
    pub fn advance(&mut self, text_batch: usize, table_batch: usize) {
        self.text_cursor += text_batch;
        self.table_cursor += table_batch;
    }

    /// Current expansion step of `source`.
    pub fn expansion_step(&self, source: &str) -> u32 {
        self.expansion_steps.get(source).copied().unwrap_or(0)
    }
}
