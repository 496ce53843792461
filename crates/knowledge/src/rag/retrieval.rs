//! Candidate retrieval and neighbour page lookups.

use crate::backend::SearchBackend;
use crate::config::RetrievalConfig;
use crate::tokens::estimate_tokens;
use crate::types::{Chunk, ChunkFilter, ChunkType};
use docask_core::AppResult;
use std::collections::HashSet;
use std::time::Duration;

/// Query text sent with exact page lookups.
const PAGE_LOOKUP_QUERY: &str = "context retrieval";

/// Candidate pools fetched once per question.
#[derive(Debug, Clone, Default)]
pub struct CandidatePools {
    pub text: Vec<Chunk>,
    pub tables: Vec<Chunk>,
}

impl CandidatePools {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.tables.is_empty()
    }
}

/// Run one search bounded by `timeout`.
async fn search_with_timeout(
    backend: &dyn SearchBackend,
    query: &str,
    filter: &ChunkFilter,
    limit: usize,
    timeout: Duration,
) -> AppResult<Vec<Chunk>> {
    match tokio::time::timeout(timeout, backend.search(query, filter, limit)).await {
        Ok(result) => result,
        Err(_) => Err(docask_core::AppError::Knowledge(format!(
            "Search timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

/// Fetch the table and text candidate pools for `query`.
///
/// A failed or timed-out query yields an empty pool. Text chunks below
/// `min_text_tokens` are dropped; table chunks are kept regardless of size.
pub async fn retrieve_candidates(
    backend: &dyn SearchBackend,
    query: &str,
    settings: &RetrievalConfig,
) -> CandidatePools {
    let timeout = settings.search_timeout();

    let tables = match search_with_timeout(
        backend,
        query,
        &ChunkFilter::Tables,
        settings.table_candidates,
        timeout,
    )
    .await
    {
        Ok(chunks) => chunks
            .into_iter()
            .map(|mut chunk| {
                if !chunk.chunk_type.is_table() {
                    chunk.chunk_type = ChunkType::Table;
                }
                chunk
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Table search failed, continuing without tables: {}", e);
            Vec::new()
        }
    };

    let text: Vec<Chunk> = match search_with_timeout(
        backend,
        query,
        &ChunkFilter::Text,
        settings.text_candidates,
        timeout,
    )
    .await
    {
        Ok(chunks) => chunks
            .into_iter()
            .filter(|chunk| estimate_tokens(&chunk.content) >= settings.min_text_tokens)
            .collect(),
        Err(e) => {
            tracing::warn!("Text search failed, continuing without text: {}", e);
            Vec::new()
        }
    };

    tracing::info!(
        "Retrieved {} text and {} table candidates",
        text.len(),
        tables.len()
    );

    CandidatePools { text, tables }
}

/// Fetch the pages within `range` of each cited chunk's pages.
///
/// The cited chunk's own pages and pages below 1 are skipped. Each
/// `(source, page)` is queried at most once per call. Lookup failures are
/// logged and skipped.
pub async fn surrounding_pages(
    backend: &dyn SearchBackend,
    cited: &[Chunk],
    range: u32,
    limit: usize,
    timeout: Duration,
) -> Vec<Chunk> {
    let mut results = Vec::new();
    let mut seen: HashSet<(String, u32)> = HashSet::new();

    for chunk in cited {
        let (Some(source), Some(page)) = (chunk.source_name(), chunk.page_ref()) else {
            continue;
        };
        let own_pages = page.pages();

        for &current in &own_pages {
            let first = current.saturating_sub(range).max(1);
            let last = current.saturating_add(range);

            for target in first..=last {
                if own_pages.contains(&target) {
                    continue;
                }
                if !seen.insert((source.to_string(), target)) {
                    continue;
                }

                let filter = ChunkFilter::Page {
                    source: source.to_string(),
                    page: target,
                };

                match search_with_timeout(backend, PAGE_LOOKUP_QUERY, &filter, limit, timeout).await
                {
                    Ok(found) => results.extend(found),
                    Err(e) => {
                        tracing::debug!("Lookup of {} p{} failed: {}", source, target, e);
                    }
                }
            }
        }
    }

    results
}
