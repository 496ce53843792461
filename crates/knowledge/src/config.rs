//! Collection layout and retrieval configuration.

use docask_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Retrieval and answer-loop settings for a collection.
///
/// Stored at `.docask/collections/<name>/config.yaml`. Missing fields take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Name of the collection
    #[serde(default)]
    pub name: String,

    /// Text chunks taken per round
    #[serde(default = "default_text_batch_size")]
    pub text_batch_size: usize,

    /// Table chunks taken per round
    #[serde(default = "default_table_batch_size")]
    pub table_batch_size: usize,

    /// Context budget per prompt, in estimated tokens
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Previously cited chunks recalled into each prompt
    #[serde(default = "default_max_recalled_sources")]
    pub max_recalled_sources: usize,

    /// Text candidates fetched by the initial search
    #[serde(default = "default_text_candidates")]
    pub text_candidates: usize,

    /// Table candidates fetched by the initial search
    #[serde(default = "default_table_candidates")]
    pub table_candidates: usize,

    /// Text candidates below this estimate are discarded
    #[serde(default = "default_min_text_tokens")]
    pub min_text_tokens: usize,

    /// Neighbour range on the first expansion of a source
    #[serde(default = "default_base_expansion_range")]
    pub base_expansion_range: u32,

    /// Upper bound for the neighbour range
    #[serde(default = "default_max_expansion_range")]
    pub max_expansion_range: u32,

    /// Results per neighbour page lookup
    #[serde(default = "default_expansion_lookup_limit")]
    pub expansion_lookup_limit: usize,

    /// Hard bound on loop rounds
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Prior question/answer pairs summarized into the prompt
    #[serde(default = "default_history_pairs")]
    pub history_pairs: usize,

    /// Timeout for a single search call
    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,
}

fn default_text_batch_size() -> usize {
    6
}

fn default_table_batch_size() -> usize {
    4
}

fn default_max_context_tokens() -> usize {
    4000
}

fn default_max_recalled_sources() -> usize {
    6
}

fn default_text_candidates() -> usize {
    80
}

fn default_table_candidates() -> usize {
    40
}

fn default_min_text_tokens() -> usize {
    200
}

fn default_base_expansion_range() -> u32 {
    1
}

fn default_max_expansion_range() -> u32 {
    4
}

fn default_expansion_lookup_limit() -> usize {
    5
}

fn default_max_iterations() -> usize {
    40
}

fn default_history_pairs() -> usize {
    2
}

fn default_search_timeout_secs() -> u64 {
    30
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            text_batch_size: default_text_batch_size(),
            table_batch_size: default_table_batch_size(),
            max_context_tokens: default_max_context_tokens(),
            max_recalled_sources: default_max_recalled_sources(),
            text_candidates: default_text_candidates(),
            table_candidates: default_table_candidates(),
            min_text_tokens: default_min_text_tokens(),
            base_expansion_range: default_base_expansion_range(),
            max_expansion_range: default_max_expansion_range(),
            expansion_lookup_limit: default_expansion_lookup_limit(),
            max_iterations: default_max_iterations(),
            history_pairs: default_history_pairs(),
            search_timeout_secs: default_search_timeout_secs(),
        }
    }
}

impl RetrievalConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    /// Neighbour range for a source that has been expanded `step` times.
    pub fn expansion_range(&self, step: u32) -> u32 {
        self.base_expansion_range
            .saturating_add(step)
            .min(self.max_expansion_range)
    }

    /// Reject settings under which the loop cannot make progress.
    pub fn validate(&self) -> AppResult<()> {
        if self.text_batch_size == 0 && self.table_batch_size == 0 {
            return Err(AppError::Config(
                "textBatchSize and tableBatchSize cannot both be 0".to_string(),
            ));
        }

        if self.max_context_tokens == 0 {
            return Err(AppError::Config(
                "maxContextTokens must be greater than 0".to_string(),
            ));
        }

        if self.max_iterations == 0 {
            return Err(AppError::Config(
                "maxIterations must be greater than 0".to_string(),
            ));
        }

        if self.max_expansion_range < self.base_expansion_range {
            return Err(AppError::Config(format!(
                "maxExpansionRange ({}) is below baseExpansionRange ({})",
                self.max_expansion_range, self.base_expansion_range
            )));
        }

        Ok(())
    }
}

/// Load a collection's retrieval configuration.
///
/// Loads from `.docask/collections/<name>/config.yaml` if it exists,
/// otherwise returns defaults named after the collection.
pub fn load_config(workspace: &Path, name: &str) -> AppResult<RetrievalConfig> {
    let config_path = get_config_path(workspace, name);

    let mut config = if config_path.exists() {
        let content = fs::read_to_string(&config_path).map_err(|e| {
            AppError::Knowledge(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let config: RetrievalConfig = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Knowledge(format!("Failed to parse config at {:?}: {}", config_path, e))
        })?;

        tracing::debug!("Loaded retrieval config for '{}'", name);
        config
    } else {
        tracing::debug!(
            "Using default retrieval config for '{}' (no config file found)",
            name
        );
        RetrievalConfig::default()
    };

    config.name = name.to_string();
    config.validate()?;
    Ok(config)
}

/// Save a collection's retrieval configuration.
pub fn save_config(workspace: &Path, config: &RetrievalConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace, &config.name);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Knowledge(format!("Failed to create config directory: {}", e))
        })?;
    }

    let yaml = serde_yaml::to_string(config)
        .map_err(|e| AppError::Knowledge(format!("Failed to serialize config: {}", e)))?;

    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Knowledge(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved retrieval config for '{}'", config.name);
    Ok(())
}

/// Directory holding every collection.
pub fn get_collections_root(workspace: &Path) -> PathBuf {
    workspace.join(".docask").join("collections")
}

/// Directory of one collection.
pub fn get_collection_dir(workspace: &Path, name: &str) -> PathBuf {
    get_collections_root(workspace).join(name)
}

/// Path to a collection's config file.
pub fn get_config_path(workspace: &Path, name: &str) -> PathBuf {
    get_collection_dir(workspace, name).join("config.yaml")
}

/// Path to a collection's SQLite index.
pub fn get_index_path(workspace: &Path, name: &str) -> PathBuf {
    get_collection_dir(workspace, name).join("index.sqlite")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path(), "handbook").unwrap();

        assert_eq!(config.name, "handbook");
        assert_eq!(config.text_batch_size, 6);
        assert_eq!(config.table_batch_size, 4);
        assert_eq!(config.max_context_tokens, 4000);
        assert_eq!(config.max_expansion_range, 4);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp = TempDir::new().unwrap();
        let config = RetrievalConfig {
            name: "handbook".to_string(),
            max_context_tokens: 2000,
            ..Default::default()
        };

        save_config(temp.path(), &config).unwrap();

        let loaded = load_config(temp.path(), "handbook").unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = get_config_path(temp.path(), "handbook");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "textBatchSize: 3\nsearchTimeoutSecs: 5\n").unwrap();

        let config = load_config(temp.path(), "handbook").unwrap();
        assert_eq!(config.text_batch_size, 3);
        assert_eq!(config.table_batch_size, 4);
        assert_eq!(config.search_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let temp = TempDir::new().unwrap();
        let path = get_config_path(temp.path(), "broken");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "baseExpansionRange: 5\nmaxExpansionRange: 2\n").unwrap();

        assert!(load_config(temp.path(), "broken").is_err());
    }

    #[test]
    fn test_expansion_range_is_capped() {
        let config = RetrievalConfig::default();
        let ranges: Vec<u32> = (0..6).map(|step| config.expansion_range(step)).collect();
        assert_eq!(ranges, vec![1, 2, 3, 4, 4, 4]);
    }

    #[test]
    fn test_paths() {
        let ws = Path::new("/ws");
        assert_eq!(
            get_index_path(ws, "handbook"),
            PathBuf::from("/ws/.docask/collections/handbook/index.sqlite")
        );
    }
}
