//! Document collections and the iterative answering loop.
//!
//! A collection is a SQLite store of pre-chunked document records under
//! `.docask/collections/<name>/`. Questions are answered by [`rag::answer_question`],
//! which works against any [`SearchBackend`].

pub mod backend;
pub mod config;
pub mod index;
pub mod rag;
pub mod tokens;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use backend::{InMemoryIndex, SearchBackend};
pub use config::RetrievalConfig;
pub use index::SqliteIndex;
pub use rag::{answer_question, RagResponse, RagSourceRef, Termination};
pub use tokens::estimate_tokens;
pub use types::{Chunk, ChunkFilter, ChunkKey, ChunkType, CollectionStats, ImportStats, PageRef};

use docask_core::{AppError, AppResult};
use std::path::Path;
use walkdir::WalkDir;

/// Import a JSONL file of chunk records into a collection.
///
/// Creates the collection (and its default config) when it does not exist.
pub fn import(
    workspace: &Path,
    name: &str,
    jsonl_path: &Path,
    reset: bool,
) -> AppResult<ImportStats> {
    tracing::info!("Importing {:?} into collection '{}'", jsonl_path, name);

    if !jsonl_path.is_file() {
        return Err(AppError::Knowledge(format!(
            "Import file {:?} does not exist",
            jsonl_path
        )));
    }

    let config = config::load_config(workspace, name)?;
    let index = SqliteIndex::open(&config::get_index_path(workspace, name))?;

    if reset {
        tracing::info!("Resetting collection '{}' before import", name);
        index.reset()?;
    }

    let stats = index.import_jsonl(jsonl_path)?;
    config::save_config(workspace, &config)?;

    Ok(stats)
}

/// Open an existing collection for searching.
pub fn open_collection(workspace: &Path, name: &str) -> AppResult<(SqliteIndex, RetrievalConfig)> {
    let index_path = config::get_index_path(workspace, name);
    if !index_path.exists() {
        return Err(AppError::Knowledge(format!(
            "Collection '{}' has no index. Run 'docask collection import' first.",
            name
        )));
    }

    let config = config::load_config(workspace, name)?;
    let index = SqliteIndex::open(&index_path)?;
    Ok((index, config))
}

/// Delete every chunk of a collection.
pub fn reset(workspace: &Path, name: &str) -> AppResult<()> {
    tracing::info!("Resetting collection '{}'", name);

    let (index, _) = open_collection(workspace, name)?;
    index.reset()?;

    tracing::info!("Collection '{}' reset", name);
    Ok(())
}

/// Get statistics for a collection.
pub fn stats(workspace: &Path, name: &str) -> AppResult<CollectionStats> {
    let (index, _) = open_collection(workspace, name)?;
    let (sources_count, chunks_count, tables_count) = index.counts()?;
    let db_size_bytes = std::fs::metadata(index.path())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(CollectionStats {
        name: name.to_string(),
        sources_count,
        chunks_count,
        tables_count,
        db_size_bytes,
        last_import_at: index.last_import_at()?,
    })
}

/// Names of the collections in a workspace that have an index.
pub fn list_collections(workspace: &Path) -> AppResult<Vec<String>> {
    let root = config::get_collections_root(workspace);
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut names: Vec<String> = WalkDir::new(&root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir() && e.path().join("index.sqlite").exists())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .collect();

    names.sort();
    Ok(names)
}
