//! Configuration management for docask.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Config files (.docask/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with collections and prompt
//! overrides stored in `.docask/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the completion client knows how to talk to.
pub const KNOWN_PROVIDERS: [&str; 3] = ["groq", "openai", "ollama"];

/// Highest numbered `DOCASK_API_KEY_<n>` variable scanned for credentials.
const MAX_NUMBERED_KEYS: usize = 32;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docask/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Completion provider ("groq", "openai", "ollama")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Endpoint override for the provider
    pub endpoint: Option<String>,

    /// Credentials rotated by the completion client
    #[serde(skip_serializing)]
    pub api_keys: Vec<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Log record format ("pretty" or "json")
    pub log_format: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Completion request tunables
    pub completion: CompletionConfig,

    /// Provider configurations from config.yaml
    pub llm: Option<LlmConfig>,
}

/// Completion request tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Rate-limit window applied when the server sends no retry hint
    #[serde(default = "default_rate_limit_fallback_secs")]
    pub rate_limit_fallback_secs: u64,

    /// Pause before retrying after a transport failure
    #[serde(default = "default_transport_retry_pause_secs")]
    pub transport_retry_pause_secs: u64,

    /// Transport failures tolerated for a single completion call
    #[serde(default = "default_max_transport_retries")]
    pub max_transport_retries: u32,
}

fn default_temperature() -> f32 {
    0.05
}

fn default_max_output_tokens() -> u32 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_rate_limit_fallback_secs() -> u64 {
    60
}

fn default_transport_retry_pause_secs() -> u64 {
    5
}

fn default_max_transport_retries() -> u32 {
    5
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            rate_limit_fallback_secs: default_rate_limit_fallback_secs(),
            transport_retry_pause_secs: default_transport_retry_pause_secs(),
            max_transport_retries: default_max_transport_retries(),
        }
    }
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    /// OpenAI-compatible hosted endpoint (Groq, OpenAI)
    Hosted {
        #[serde(rename = "apiKeyEnvs")]
        api_key_envs: Vec<String>,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    pub fn model(&self) -> &str {
        match self {
            Self::Hosted { model, .. } | Self::Ollama { model, .. } => model,
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Hosted { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    completion: Option<CompletionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "groq".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            endpoint: None,
            api_keys: Vec::new(),
            log_level: None,
            log_format: None,
            verbose: false,
            no_color: false,
            completion: CompletionConfig::default(),
            llm: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML config file and environment variables.
    ///
    /// Environment variables:
    /// - `DOCASK_WORKSPACE`: Override workspace path
    /// - `DOCASK_CONFIG`: Path to config file
    /// - `DOCASK_PROVIDER`: Completion provider
    /// - `DOCASK_MODEL`: Model identifier
    /// - `DOCASK_ENDPOINT`: Endpoint override
    /// - `DOCASK_API_KEY`, `DOCASK_API_KEY_1` .. `DOCASK_API_KEY_32`: Credentials
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use docask_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("DOCASK_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("DOCASK_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.workspace.join(".docask/config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("DOCASK_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("DOCASK_MODEL") {
            config.model = model;
        }

        if let Ok(endpoint) = std::env::var("DOCASK_ENDPOINT") {
            config.endpoint = Some(endpoint);
        }

        config.api_keys = collect_env_keys(|name| std::env::var(name).ok());
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_format = Some(format);
            }
        }

        if let Some(completion) = config_file.completion {
            result.completion = completion;
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
                result.endpoint = provider_config.endpoint().map(str::to_string);
            }

            result.llm = Some(llm);
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and the
    /// config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .docask directory.
    pub fn docask_dir(&self) -> PathBuf {
        self.workspace.join(".docask")
    }

    /// Ensure the .docask directory exists.
    pub fn ensure_docask_dir(&self) -> AppResult<()> {
        let dir = self.docask_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .docask directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Get a provider configuration by name.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Resolve the credential list for the active provider.
    ///
    /// `DOCASK_API_KEY*` variables win; otherwise the provider's `apiKeyEnvs`
    /// are read in order. Unset variables are skipped.
    pub fn resolve_credentials(&self) -> Vec<String> {
        if !self.api_keys.is_empty() {
            return self.api_keys.clone();
        }

        match self.get_provider_config(&self.provider) {
            Some(ProviderConfig::Hosted { api_key_envs, .. }) => api_key_envs
                .iter()
                .filter_map(|name| std::env::var(name).ok())
                .filter(|key| !key.trim().is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.to_lowercase();

        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider != "ollama" && self.resolve_credentials().is_empty() {
            return Err(AppError::Config(format!(
                "No credentials found for provider '{}'. Set DOCASK_API_KEY or DOCASK_API_KEY_1..DOCASK_API_KEY_{}",
                self.provider, MAX_NUMBERED_KEYS
            )));
        }

        if self.completion.max_output_tokens == 0 {
            return Err(AppError::Config(
                "completion.maxOutputTokens must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Collect credentials from `DOCASK_API_KEY` and the numbered variants.
fn collect_env_keys(lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
    std::iter::once("DOCASK_API_KEY".to_string())
        .chain((1..=MAX_NUMBERED_KEYS).map(|n| format!("DOCASK_API_KEY_{}", n)))
        .filter_map(|name| lookup(&name))
        .filter(|key| !key.trim().is_empty())
        .collect()
}
