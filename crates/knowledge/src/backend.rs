//! Search backend abstraction for chunk retrieval.
//!
//! The answer loop only needs `search(query, filter, limit)`. Two backends
//! implement it: [`InMemoryIndex`] here and the SQLite collection store in
//! [`crate::index`]. Both rank with the same lexical term-overlap score.

use crate::types::{Chunk, ChunkFilter};
use docask_core::AppResult;
use std::collections::{HashMap, HashSet};

/// Trait for chunk search backends.
///
/// Implementations must:
/// - return only chunks matching `filter`
/// - return at most `limit` chunks, best first
/// - return an empty list rather than an error when nothing matches
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(
        &self,
        query: &str,
        filter: &ChunkFilter,
        limit: usize,
    ) -> AppResult<Vec<Chunk>>;
}

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "when", "where", "who", "how", "does", "can",
];

/// Lower-cased search terms of `text`, without stop words and short words.
pub(crate) fn terms(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Term-overlap score of `content` against the query terms.
pub(crate) fn lexical_score(query_terms: &HashSet<String>, content: &str) -> f32 {
    let mut freq: HashMap<String, u32> = HashMap::new();
    for term in terms(content) {
        if query_terms.contains(&term) {
            *freq.entry(term).or_insert(0) += 1;
        }
    }

    freq.values().map(|&tf| (1.0 + tf as f32).ln()).sum()
}

/// Apply `filter` to `candidates` and keep the best `limit`.
///
/// Page lookups keep candidate order. Type-filtered queries keep only chunks
/// sharing at least one term with the query, ordered by descending score;
/// ties keep candidate order.
pub(crate) fn select(
    query: &str,
    filter: &ChunkFilter,
    candidates: impl IntoIterator<Item = Chunk>,
    limit: usize,
) -> Vec<Chunk> {
    let matching = candidates.into_iter().filter(|c| filter.matches(c));

    if let ChunkFilter::Page { .. } = filter {
        return matching.take(limit).collect();
    }

    let query_terms: HashSet<String> = terms(query).into_iter().collect();
    let mut scored: Vec<(Chunk, f32)> = matching
        .map(|chunk| {
            let score = lexical_score(&query_terms, &chunk.content);
            (chunk, score)
        })
        .filter(|(_, score)| *score > 0.0)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);

    scored.into_iter().map(|(chunk, _)| chunk).collect()
}

/// Search backend over chunks held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndex {
    chunks: Vec<Chunk>,
}

impl InMemoryIndex {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Chunk::resolved).collect(),
        }
    }

    pub fn push(&mut self, chunk: Chunk) {
        self.chunks.push(chunk.resolved());
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[async_trait::async_trait]
impl SearchBackend for InMemoryIndex {
    async fn search(
        &self,
        query: &str,
        filter: &ChunkFilter,
        limit: usize,
    ) -> AppResult<Vec<Chunk>> {
        let results = select(query, filter, self.chunks.iter().cloned(), limit);
        tracing::debug!(
            "In-memory search returned {} chunks (filter: {:?}, limit: {})",
            results.len(),
            filter,
            limit
        );
        Ok(results)
    }
}
