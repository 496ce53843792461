//! Chunk batch planning.
//!
//! Each round shows the model one batch. The first round takes the head of
//! both candidate pools. After a partial answer the planner widens the
//! neighbourhood of every cited source instead; otherwise it moves on to the
//! next window of unseen candidates. Empty batches mean the pools are spent.

use crate::backend::SearchBackend;
use crate::config::RetrievalConfig;
use crate::rag::classify::is_incomplete;
use crate::rag::retrieval::surrounding_pages;
use crate::rag::state::RoundState;
use crate::types::Chunk;
use std::collections::HashSet;

/// Chunks selected for one round.
#[derive(Debug, Clone, Default)]
pub struct ChunkBatch {
    pub text: Vec<Chunk>,
    pub tables: Vec<Chunk>,

    /// Neighbour pages of cited sources; expansion rounds leave the cursors
    /// in place
    pub is_expanding: bool,
}

impl ChunkBatch {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.text.len() + self.tables.len()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.tables.iter().chain(self.text.iter())
    }
}

/// Selects the next batch from the candidate pools.
pub struct BatchPlanner<'a> {
    text_pool: &'a [Chunk],
    table_pool: &'a [Chunk],
    settings: &'a RetrievalConfig,
}

impl<'a> BatchPlanner<'a> {
    pub fn new(
        text_pool: &'a [Chunk],
        table_pool: &'a [Chunk],
        settings: &'a RetrievalConfig,
    ) -> Self {
        Self {
            text_pool,
            table_pool,
            settings,
        }
    }

    /// True once both cursors have passed the end of their pools.
    pub fn is_exhausted(&self, state: &RoundState) -> bool {
        state.text_cursor >= self.text_pool.len() && state.table_cursor >= self.table_pool.len()
    }

    /// Pick the chunks for the current round.
    pub async fn next_batch(
        &self,
        state: &mut RoundState,
        backend: &dyn SearchBackend,
    ) -> ChunkBatch {
        if state.iteration == 1 {
            return self.first_pass(state);
        }

        if is_incomplete(&state.last_answer) && !state.cited.is_empty() {
            let batch = self.expand(state, backend).await;
            if !batch.is_empty() {
                tracing::debug!("Expansion batch: {} chunks", batch.len());
                return batch;
            }
            tracing::debug!("Expansion found nothing new, advancing");
        }

        self.advance(state)
    }

    fn first_pass(&self, state: &RoundState) -> ChunkBatch {
        ChunkBatch {
            text: window(self.text_pool, state.text_cursor, self.settings.text_batch_size).to_vec(),
            tables: window(self.table_pool, state.table_cursor, self.settings.table_batch_size)
                .to_vec(),
            is_expanding: false,
        }
    }

    /// Neighbour pages of each cited source, first citation per source.
    async fn expand(&self, state: &mut RoundState, backend: &dyn SearchBackend) -> ChunkBatch {
        let mut seen_sources: HashSet<String> = HashSet::new();
        let mut expanded = Vec::new();

        let cited = state.cited.clone();
        for chunk in &cited {
            let Some(source) = chunk.source_name() else {
                continue;
            };
            if !seen_sources.insert(source.to_string()) {
                continue;
            }

            let step = state.expansion_step(source);
            let range = self.settings.expansion_range(step);

            let found = surrounding_pages(
                backend,
                std::slice::from_ref(chunk),
                range,
                self.settings.expansion_lookup_limit,
                self.settings.search_timeout(),
            )
            .await;

            tracing::debug!(
                "Expanded {} by ±{} pages: {} chunks",
                source,
                range,
                found.len()
            );

            if !found.is_empty() {
                state.expansion_steps.insert(source.to_string(), step + 1);
                expanded.extend(found);
            }
        }

        let mut batch = ChunkBatch {
            is_expanding: true,
            ..Default::default()
        };
        for chunk in expanded {
            if !state.used_pages.insert(chunk.key()) {
                continue;
            }
            if chunk.chunk_type.is_table() {
                batch.tables.push(chunk);
            } else {
                batch.text.push(chunk);
            }
        }

        batch
    }

    /// Next window of candidates not yet shown.
    ///
    /// Windows whose candidates were all shown already are skipped, moving
    /// the cursors past them.
    fn advance(&self, state: &mut RoundState) -> ChunkBatch {
        while !self.is_exhausted(state) {
            let text: Vec<Chunk> = window(self.text_pool, state.text_cursor, self.settings.text_batch_size)
                .iter()
                .filter(|c| !state.is_used(c))
                .cloned()
                .collect();
            let tables: Vec<Chunk> =
                window(self.table_pool, state.table_cursor, self.settings.table_batch_size)
                    .iter()
                    .filter(|c| !state.is_used(c))
                    .cloned()
                    .collect();

            let batch = ChunkBatch {
                text,
                tables,
                is_expanding: false,
            };
            if !batch.is_empty() {
                return batch;
            }

            tracing::debug!(
                "Window at text {} / table {} already shown, skipping",
                state.text_cursor,
                state.table_cursor
            );
            state.advance(self.settings.text_batch_size, self.settings.table_batch_size);
        }

        ChunkBatch::default()
    }
}

fn window(pool: &[Chunk], start: usize, size: usize) -> &[Chunk] {
    let start = start.min(pool.len());
    let end = start.saturating_add(size).min(pool.len());
    &pool[start..end]
}
