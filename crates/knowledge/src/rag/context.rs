//! Context assembly for one round.

use crate::tokens::estimate_tokens;
use crate::types::{Chunk, ChunkKey};
use std::collections::HashSet;

/// Separator placed between rendered entries.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Context text for one prompt and the chunks it contains.
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    pub text: String,

    /// Chunks that survived trimming, in the order they were appended
    pub chunks: Vec<Chunk>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

fn type_label(chunk: &Chunk) -> &'static str {
    if chunk.chunk_type.is_table() {
        "TABLE"
    } else {
        "TEXT"
    }
}

fn render(marker: &str, chunk: &Chunk) -> String {
    let key = chunk.key();
    format!(
        "[{} {} {} p{}]\n{}",
        marker,
        type_label(chunk),
        key.source,
        key.page,
        chunk.content
    )
}

/// Build the context block for one round.
///
/// Entries are appended in priority order, skipping any `(source, page)`
/// already present:
/// 1. the last `max_recalled` cited chunks, marked `USED`
/// 2. new tables, marked `NEW`
/// 3. new text, marked `NEW`
///
/// While the estimate exceeds `max_tokens` and more than one entry remains,
/// the last entry is dropped.
pub fn assemble_context(
    cited: &[Chunk],
    new_text: &[Chunk],
    new_tables: &[Chunk],
    max_tokens: usize,
    max_recalled: usize,
) -> AssembledContext {
    let mut seen: HashSet<ChunkKey> = HashSet::new();
    let mut entries: Vec<(String, &Chunk)> = Vec::new();

    let recalled = &cited[cited.len().saturating_sub(max_recalled)..];
    let sections = [
        ("USED", recalled),
        ("NEW", new_tables),
        ("NEW", new_text),
    ];

    for (marker, chunks) in sections {
        for chunk in chunks {
            if seen.insert(chunk.key()) {
                entries.push((render(marker, chunk), chunk));
            }
        }
    }

    let separator_chars = CONTEXT_SEPARATOR.chars().count();
    let mut total_chars: usize = entries.iter().map(|(text, _)| text.chars().count()).sum::<usize>()
        + separator_chars * entries.len().saturating_sub(1);

    while total_chars / 4 > max_tokens && entries.len() > 1 {
        if let Some((dropped, chunk)) = entries.pop() {
            total_chars -= dropped.chars().count() + separator_chars;
            tracing::debug!("Trimmed {} from context", chunk.key());
        }
    }

    let text = entries
        .iter()
        .map(|(text, _)| text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    debug_assert_eq!(total_chars / 4, estimate_tokens(&text));

    AssembledContext {
        text,
        chunks: entries.into_iter().map(|(_, chunk)| chunk.clone()).collect(),
    }
}
