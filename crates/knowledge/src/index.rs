//! SQLite-backed chunk store for a collection.

use crate::backend::{select, SearchBackend};
use crate::types::{Chunk, ChunkFilter, ChunkType, ImportStats, PageRef};
use chrono::Utc;
use docask_core::{AppError, AppResult};
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

const TABLE_TYPES: &str = "('table', 'table_with_context')";

/// Chunk store persisted in a single SQLite file.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl fmt::Debug for SqliteIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteIndex").field("path", &self.path).finish()
    }
}

impl SqliteIndex {
    /// Open (or create) the index database.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Knowledge(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT,
                page TEXT,
                page_num INTEGER,
                chunk_type TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT,
                imported_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_source_page ON chunks(source, page_num);
            CREATE INDEX IF NOT EXISTS idx_chunks_type ON chunks(chunk_type);
            "#,
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

        tracing::debug!("Opened SQLite index at {:?}", db_path);
        Ok(Self {
            conn: Mutex::new(conn),
            path: db_path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert one chunk.
    pub fn insert_chunk(&self, chunk: &Chunk) -> AppResult<()> {
        let conn = self.lock();
        insert_row(&conn, chunk, &Utc::now().to_rfc3339())
    }

    /// Import chunk records from a JSONL file, one record per line.
    ///
    /// Lines that fail to parse are skipped and counted.
    pub fn import_jsonl(&self, jsonl_path: &Path) -> AppResult<ImportStats> {
        let start = Instant::now();

        let contents = std::fs::read_to_string(jsonl_path).map_err(|e| {
            AppError::Knowledge(format!("Failed to read {:?}: {}", jsonl_path, e))
        })?;

        let imported_at = Utc::now().to_rfc3339();
        let mut chunks_imported = 0u32;
        let mut lines_skipped = 0u32;
        let mut sources = HashSet::new();

        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Knowledge(format!("Failed to start transaction: {}", e)))?;

        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let chunk = match serde_json::from_str::<Chunk>(line) {
                Ok(chunk) => chunk.resolved(),
                Err(e) => {
                    tracing::warn!("Skipping line {} of {:?}: {}", line_no + 1, jsonl_path, e);
                    lines_skipped += 1;
                    continue;
                }
            };

            insert_row(&tx, &chunk, &imported_at)?;
            if let Some(source) = chunk.source_name() {
                sources.insert(source.to_string());
            }
            chunks_imported += 1;
        }

        tx.commit()
            .map_err(|e| AppError::Knowledge(format!("Failed to commit import: {}", e)))?;

        let duration = start.elapsed();
        tracing::info!(
            "Imported {} chunks from {:?} ({} skipped) in {:.2}s",
            chunks_imported,
            jsonl_path,
            lines_skipped,
            duration.as_secs_f64()
        );

        Ok(ImportStats {
            chunks_imported,
            lines_skipped,
            sources_count: sources.len() as u32,
            duration_secs: duration.as_secs_f64(),
        })
    }

    /// Load every chunk matching `filter`, in insertion order.
    fn load(&self, filter: &ChunkFilter, limit: Option<usize>) -> AppResult<Vec<Chunk>> {
        let conn = self.lock();

        let (sql, args): (String, Vec<rusqlite::types::Value>) = match filter {
            ChunkFilter::Tables => (
                format!(
                    "SELECT source, page, chunk_type, content, metadata FROM chunks \
                     WHERE chunk_type IN {} ORDER BY id",
                    TABLE_TYPES
                ),
                Vec::new(),
            ),
            ChunkFilter::Text => (
                format!(
                    "SELECT source, page, chunk_type, content, metadata FROM chunks \
                     WHERE chunk_type NOT IN {} ORDER BY id",
                    TABLE_TYPES
                ),
                Vec::new(),
            ),
            ChunkFilter::Page { source, page } => (
                "SELECT source, page, chunk_type, content, metadata FROM chunks \
                 WHERE source = ?1 AND page_num = ?2 ORDER BY id LIMIT ?3"
                    .to_string(),
                vec![
                    source.clone().into(),
                    i64::from(*page).into(),
                    (limit.unwrap_or(usize::MAX).min(i64::MAX as usize) as i64).into(),
                ],
            ),
        };

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(rusqlite::params_from_iter(args), |row| {
                let source: Option<String> = row.get(0)?;
                let page: Option<String> = row.get(1)?;
                let chunk_type: String = row.get(2)?;
                let content: String = row.get(3)?;
                let metadata: Option<String> = row.get(4)?;
                Ok((source, page, chunk_type, content, metadata))
            })
            .map_err(|e| AppError::Knowledge(format!("Failed to query chunks: {}", e)))?;

        let mut chunks = Vec::new();
        for row in rows {
            let (source, page, chunk_type, content, metadata) =
                row.map_err(|e| AppError::Knowledge(format!("Failed to read chunk: {}", e)))?;

            let metadata = metadata
                .and_then(|m| serde_json::from_str(&m).ok())
                .unwrap_or(serde_json::Value::Null);

            chunks.push(Chunk {
                content,
                source,
                page: page.map(|p| PageRef::parse(&p)),
                chunk_type: ChunkType::from_label(&chunk_type),
                metadata,
            });
        }

        Ok(chunks)
    }

    /// Count (sources, chunks, tables).
    pub fn counts(&self) -> AppResult<(u32, u32, u32)> {
        let conn = self.lock();

        let count = |sql: &str| -> AppResult<u32> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0).map(|v| v as u32))
                .map_err(|e| AppError::Knowledge(format!("Failed to count chunks: {}", e)))
        };

        let sources = count("SELECT COUNT(DISTINCT source) FROM chunks")?;
        let chunks = count("SELECT COUNT(*) FROM chunks")?;
        let tables = count(&format!(
            "SELECT COUNT(*) FROM chunks WHERE chunk_type IN {}",
            TABLE_TYPES
        ))?;

        Ok((sources, chunks, tables))
    }

    /// Timestamp of the most recent import, if any.
    pub fn last_import_at(&self) -> AppResult<Option<String>> {
        let conn = self.lock();
        conn.query_row("SELECT MAX(imported_at) FROM chunks", [], |row| row.get(0))
            .map_err(|e| AppError::Knowledge(format!("Failed to read import time: {}", e)))
    }

    /// Delete all chunks.
    pub fn reset(&self) -> AppResult<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM chunks", [])
            .map_err(|e| AppError::Knowledge(format!("Failed to delete chunks: {}", e)))?;

        tracing::info!("Reset collection index at {:?}", self.path);
        Ok(())
    }
}

fn insert_row(conn: &Connection, chunk: &Chunk, imported_at: &str) -> AppResult<()> {
    let page = chunk.page_ref();
    let page_num = match &page {
        Some(PageRef::Number(n)) => Some(i64::from(*n)),
        _ => None,
    };
    let metadata = if chunk.metadata.is_null() {
        None
    } else {
        Some(serde_json::to_string(&chunk.metadata)?)
    };

    conn.execute(
        "INSERT INTO chunks (source, page, page_num, chunk_type, content, metadata, imported_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            chunk.source_name(),
            page.map(|p| p.to_string()),
            page_num,
            chunk.chunk_type.as_str(),
            chunk.content,
            metadata,
            imported_at,
        ],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to insert chunk: {}", e)))?;

    Ok(())
}

#[async_trait::async_trait]
impl SearchBackend for SqliteIndex {
    async fn search(
        &self,
        query: &str,
        filter: &ChunkFilter,
        limit: usize,
    ) -> AppResult<Vec<Chunk>> {
        let candidates = match filter {
            ChunkFilter::Page { .. } => self.load(filter, Some(limit))?,
            _ => self.load(filter, None)?,
        };

        let results = select(query, filter, candidates, limit);
        tracing::debug!(
            "SQLite search returned {} chunks (filter: {:?}, limit: {})",
            results.len(),
            filter,
            limit
        );
        Ok(results)
    }
}
