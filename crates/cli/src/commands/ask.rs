//! Ask command handler.
//!
//! Answers a question from one collection through the iterative answer loop.

use clap::Args;
use docask_core::{config::AppConfig, AppError, AppResult};
use docask_knowledge::{answer_question, open_collection, RagResponse};
use docask_llm::{create_client, CompletionSettings, CredentialPool, ProviderType, ResilientCompleter};
use docask_prompt::{HistoryTurn, PromptSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Ask a question about a collection
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Collection to answer from
    #[arg(short = 'C', long)]
    pub collection: String,

    /// JSON file with the prior conversation ([{"role": "user", "content": "..."}, ...])
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command on collection '{}'", self.collection);
        tracing::debug!("Ask command options: {:?}", self);

        config.validate()?;

        let prior = match &self.history {
            Some(path) => load_history(path)?,
            None => Vec::new(),
        };

        let completer = build_completer(config)?;
        let prompts = PromptSet::load(&config.workspace)?;
        let (index, settings) = open_collection(&config.workspace, &self.collection)?;

        let response =
            answer_question(&self.question, &prior, &index, &completer, &prompts, &settings)
                .await?;

        tracing::debug!(
            "Answer loop ended: {:?} after {} rounds with {} sources",
            response.termination,
            response.iterations,
            response.sources.len()
        );

        if self.json {
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else {
            print_response(&response);
        }

        Ok(())
    }
}

/// Completion client, credential pool and retry policy for the active provider.
fn build_completer(config: &AppConfig) -> AppResult<ResilientCompleter> {
    let timeout = Duration::from_secs(config.completion.request_timeout_secs);
    let client = create_client(&config.provider, config.endpoint.as_deref(), timeout)
        .map_err(AppError::Config)?;

    let needs_credentials =
        ProviderType::parse(&config.provider).map_or(true, |p| p.requires_credentials());
    let pool = if needs_credentials {
        CredentialPool::new(config.resolve_credentials())?
    } else {
        CredentialPool::anonymous()
    };
    tracing::debug!("Credential pool: {:?}", pool);

    Ok(ResilientCompleter::new(
        client,
        Arc::new(pool),
        CompletionSettings::from_config(&config.model, &config.completion),
    ))
}

fn load_history(path: &Path) -> AppResult<Vec<HistoryTurn>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Failed to read history file {:?}: {}", path, e))
    })?;
    let turns: Vec<HistoryTurn> = serde_json::from_str(&contents)?;
    tracing::debug!("Loaded {} prior turns from {:?}", turns.len(), path);
    Ok(turns)
}

fn print_response(response: &RagResponse) {
    println!("{}", response.answer);
    println!();

    if response.sources.is_empty() {
        println!("Sources: (no sources available)");
    } else {
        println!("Sources:");
        for source in &response.sources {
            println!("- {} p{} [{}]", source.source, source.page, source.chunk_type.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_history() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history.json");
        std::fs::write(
            &path,
            r#"[{"role":"user","content":"When is the exam?"},{"role":"assistant","content":"In June."}]"#,
        )
        .unwrap();

        let turns = load_history(&path).unwrap();
        assert_eq!(
            turns,
            vec![HistoryTurn::user("When is the exam?"), HistoryTurn::assistant("In June.")]
        );
    }

    #[test]
    fn test_load_history_rejects_bad_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(load_history(&path).is_err());
    }

    #[test]
    fn test_ollama_uses_anonymous_pool() {
        let config = AppConfig {
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            ..AppConfig::default()
        };
        assert!(build_completer(&config).is_ok());
    }
}
