//! Collection command handler.
//!
//! Imports pre-chunked JSONL records and inspects collections.

use clap::{Args, Subcommand};
use docask_core::{config::AppConfig, AppResult};
use std::path::PathBuf;

/// Collection management
#[derive(Args, Debug)]
pub struct CollectionCommand {
    #[command(subcommand)]
    pub action: CollectionAction,
}

#[derive(Subcommand, Debug)]
pub enum CollectionAction {
    /// Import chunk records from a JSONL file
    Import(CollectionImportCommand),
    /// Show collection statistics
    Stats(CollectionStatsCommand),
    /// List collections in the workspace
    List(CollectionListCommand),
    /// Delete every chunk of a collection
    Reset(CollectionResetCommand),
}

impl CollectionCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            CollectionAction::Import(cmd) => cmd.execute(config),
            CollectionAction::Stats(cmd) => cmd.execute(config),
            CollectionAction::List(cmd) => cmd.execute(config),
            CollectionAction::Reset(cmd) => cmd.execute(config),
        }
    }
}

/// Import chunk records
#[derive(Args, Debug)]
pub struct CollectionImportCommand {
    /// Collection name
    pub name: String,

    /// JSONL file with one chunk record per line
    pub file: PathBuf,

    /// Reset the collection before importing
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CollectionImportCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing collection import for '{}'", self.name);

        let stats = docask_knowledge::import(&config.workspace, &self.name, &self.file, self.reset)?;

        if self.json {
            let output = serde_json::json!({
                "collection": self.name,
                "chunksImported": stats.chunks_imported,
                "linesSkipped": stats.lines_skipped,
                "sourcesCount": stats.sources_count,
                "durationSecs": stats.duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Imported {} chunks from {} sources in {:.2}s",
                stats.chunks_imported, stats.sources_count, stats.duration_secs
            );
            if stats.lines_skipped > 0 {
                println!("Skipped {} malformed lines", stats.lines_skipped);
            }
        }

        Ok(())
    }
}

/// Show collection stats
#[derive(Args, Debug)]
pub struct CollectionStatsCommand {
    /// Collection name
    pub name: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CollectionStatsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing collection stats for '{}'", self.name);

        let stats = docask_knowledge::stats(&config.workspace, &self.name)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("Collection: {}", stats.name);
            println!("Sources: {}", stats.sources_count);
            println!("Chunks: {} ({} tables)", stats.chunks_count, stats.tables_count);
            println!("Database size: {} bytes", stats.db_size_bytes);
            println!(
                "Last import: {}",
                stats.last_import_at.as_deref().unwrap_or("never")
            );
        }

        Ok(())
    }
}

/// List collections
#[derive(Args, Debug)]
pub struct CollectionListCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CollectionListCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let names = docask_knowledge::list_collections(&config.workspace)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&names)?);
        } else if names.is_empty() {
            println!("No collections. Run 'docask collection import <name> <file>' to create one.");
        } else {
            for name in names {
                println!("{}", name);
            }
        }

        Ok(())
    }
}

/// Reset a collection
#[derive(Args, Debug)]
pub struct CollectionResetCommand {
    /// Collection name
    pub name: String,
}

impl CollectionResetCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing collection reset for '{}'", self.name);

        docask_knowledge::reset(&config.workspace, &self.name)?;
        println!("Collection '{}' reset", self.name);

        Ok(())
    }
}
