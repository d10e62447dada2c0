//! Configuration management for Cosmic Chat.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config file (`.cosmic/config.yaml`, or the path in `COSMIC_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric: history, feedback and the passage
//! index live under `.cosmic/` unless configured otherwise.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default request timeout for answer backends, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Which answer backend the pipeline talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local generation endpoint fed with a fully assembled prompt
    Local,
    /// Remote answer server that retrieves and generates on its own
    Remote,
}

impl BackendKind {
    /// Parse a backend name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "local" | "ollama" => Some(Self::Local),
            "remote" | "server" => Some(Self::Remote),
            _ => None,
        }
    }

    /// Get the canonical backend name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// How a clarification after negative feedback is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryPolicy {
    /// Reuse the passages attached to the judged answer
    #[default]
    Reuse,
    /// Run retrieval again for the clarified question
    Reretrieve,
}

/// Remote answer server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSettings {
    /// Chat endpoint URL (e.g. `http://host:8000/chat`)
    #[serde(default)]
    pub url: Option<String>,

    /// Environment variable holding the bearer token
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

/// Local generation endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSettings {
    #[serde(default = "default_local_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_local_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

/// Embedding provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// Provider name: "trigram" or "ollama"
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Endpoint for HTTP providers
    #[serde(default = "default_local_endpoint")]
    pub endpoint: String,
}

/// Retrieval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalSettings {
    /// Number of passages to retrieve per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Passages scoring below this cosine similarity are dropped
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// SQLite passage index; relative paths resolve against the workspace
    #[serde(default)]
    pub index_path: Option<PathBuf>,
}

/// Persistence locations for chat history and feedback.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSettings {
    #[serde(default)]
    pub history_dir: Option<PathBuf>,

    #[serde(default)]
    pub feedback_log: Option<PathBuf>,
}

fn default_api_key_env() -> String {
    "COSMIC_API_KEY".to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_local_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_local_model() -> String {
    "llama3.2".to_string()
}

fn default_embedding_provider() -> String {
    "trigram".to_string()
}

fn default_embedding_model() -> String {
    "trigram-v1".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_top_k() -> usize {
    5
}

fn default_min_score() -> f32 {
    0.20
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            url: None,
            api_key_env: default_api_key_env(),
            timeout: default_timeout(),
        }
    }
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            endpoint: default_local_endpoint(),
            model: default_local_model(),
            timeout: default_timeout(),
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            endpoint: default_local_endpoint(),
        }
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
            index_path: None,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .cosmic/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active answer backend
    pub backend: BackendKind,

    /// API key for the remote backend, when given directly
    pub api_key: Option<String>,

    pub remote: RemoteSettings,

    pub local: LocalSettings,

    pub embedding: EmbeddingSettings,

    pub retrieval: RetrievalSettings,

    pub storage: StorageSettings,

    /// Clarification handling after negative feedback
    pub retry: RetryPolicy,

    /// Log level override
    pub log_level: Option<String>,

    /// Log output format ("pretty" or "json")
    pub log_format: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    backend: Option<String>,
    remote: Option<RemoteSettings>,
    local: Option<LocalSettings>,
    embedding: Option<EmbeddingSettings>,
    retrieval: Option<RetrievalSettings>,
    storage: Option<StorageSettings>,
    retry: Option<RetryFileConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RetryFileConfig {
    policy: RetryPolicy,
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
            backend: BackendKind::Local, // Local-first default
            api_key: None,
            remote: RemoteSettings::default(),
            local: LocalSettings::default(),
            embedding: EmbeddingSettings::default(),
            retrieval: RetrievalSettings::default(),
            storage: StorageSettings::default(),
            retry: RetryPolicy::default(),
            log_level: None,
            log_format: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `COSMIC_WORKSPACE`: Override workspace path
    /// - `COSMIC_CONFIG`: Path to config file
    /// - `COSMIC_BACKEND`: Answer backend ("local" or "remote")
    /// - `COSMIC_MODEL`: Local generation model
    /// - `COSMIC_REMOTE_URL`: Remote answer server URL
    /// - `COSMIC_API_KEY`: Remote bearer token
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use cosmic_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with an explicit workspace and config file
    /// taking precedence over `COSMIC_WORKSPACE` and `COSMIC_CONFIG`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace
            .or_else(|| std::env::var("COSMIC_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("COSMIC_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.workspace.join(".cosmic/config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(backend) = std::env::var("COSMIC_BACKEND") {
            config.backend = BackendKind::parse(&backend)
                .ok_or_else(|| AppError::Config(format!("Unknown backend: {}", backend)))?;
        }

        if let Ok(model) = std::env::var("COSMIC_MODEL") {
            config.local.model = model;
        }

        if let Ok(url) = std::env::var("COSMIC_REMOTE_URL") {
            config.remote.url = Some(url);
        }

        config.api_key = std::env::var("COSMIC_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Parse a YAML config string and merge it into this config.
    pub fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
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

        if let Some(backend) = config_file.backend {
            result.backend = BackendKind::parse(&backend)
                .ok_or_else(|| AppError::Config(format!("Unknown backend: {}", backend)))?;
        }

        if let Some(remote) = config_file.remote {
            result.remote = remote;
        }
        if let Some(local) = config_file.local {
            result.local = local;
        }
        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(storage) = config_file.storage {
            result.storage = storage;
        }
        if let Some(retry) = config_file.retry {
            result.retry = retry.policy;
        }

        Ok(result)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("{:?}: {}", path, e)))
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        backend: Option<BackendKind>,
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

        if let Some(backend) = backend {
            self.backend = backend;
        }

        if let Some(model) = model {
            self.local.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .cosmic directory.
    pub fn cosmic_dir(&self) -> PathBuf {
        self.workspace.join(".cosmic")
    }

    /// Ensure the .cosmic directory exists.
    pub fn ensure_cosmic_dir(&self) -> AppResult<()> {
        let cosmic_dir = self.cosmic_dir();
        if !cosmic_dir.exists() {
            std::fs::create_dir_all(&cosmic_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .cosmic directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolve a configured path against the workspace.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Directory holding one `<user>_history.json` per user.
    pub fn history_dir(&self) -> PathBuf {
        match self.storage.history_dir {
            Some(ref dir) => self.resolve(dir),
            None => self.cosmic_dir().join("chatt_historik"),
        }
    }

    /// Append-only feedback log file.
    pub fn feedback_log_path(&self) -> PathBuf {
        match self.storage.feedback_log {
            Some(ref path) => self.resolve(path),
            None => self.cosmic_dir().join("feedback_log.json"),
        }
    }

    /// SQLite passage index file.
    pub fn index_path(&self) -> PathBuf {
        match self.retrieval.index_path {
            Some(ref path) => self.resolve(path),
            None => self.cosmic_dir().join("index.sqlite"),
        }
    }

    /// Resolve the remote bearer token.
    ///
    /// An explicit `COSMIC_API_KEY` wins over the configured `apiKeyEnv` variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }
        std::env::var(&self.remote.api_key_env).ok()
    }

    /// Validate configuration for the active backend.
    ///
    /// A failure here means the application must refuse to start.
    pub fn validate(&self) -> AppResult<()> {
        let known_embedders = ["trigram", "ollama"];
        if !known_embedders.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                known_embedders.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config(
                "retrieval.topK must be greater than zero".to_string(),
            ));
        }

        match self.backend {
            BackendKind::Remote => {
                let url = self.remote.url.as_deref().unwrap_or("");
                if url.trim().is_empty() {
                    return Err(AppError::Config(
                        "Remote backend selected but remote.url is not set".to_string(),
                    ));
                }
                if self.resolve_api_key().is_none() {
                    return Err(AppError::Config(format!(
                        "API key not found in environment variable: {}",
                        self.remote.api_key_env
                    )));
                }
                validate_timeout(self.remote.timeout)?;
            }
            BackendKind::Local => {
                if self.local.model.trim().is_empty() {
                    return Err(AppError::Config(
                        "Local backend selected but local.model is empty".to_string(),
                    ));
                }
                validate_timeout(self.local.timeout)?;
            }
        }

        Ok(())
    }
}

fn validate_timeout(timeout: u64) -> AppResult<()> {
    if timeout == 0 || timeout > 600 {
        return Err(AppError::Config(format!(
            "Timeout must be between 1 and 600 seconds, got {}",
            timeout
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.local.model, "llama3.2");
        assert_eq!(config.local.timeout, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retry, RetryPolicy::Reuse);
        assert!(!config.verbose);
        assert!(!config.no_color);
    }

    #[test]
    fn test_storage_paths() {
        let mut config = AppConfig::default();
        config.workspace = PathBuf::from("/srv/cosmic");

        assert_eq!(
            config.history_dir(),
            PathBuf::from("/srv/cosmic/.cosmic/chatt_historik")
        );
        assert_eq!(
            config.feedback_log_path(),
            PathBuf::from("/srv/cosmic/.cosmic/feedback_log.json")
        );

        config.storage.history_dir = Some(PathBuf::from("history"));
        assert_eq!(config.history_dir(), PathBuf::from("/srv/cosmic/history"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some(BackendKind::Remote),
            Some("mistral".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.backend, BackendKind::Remote);
        assert_eq!(overridden.local.model, "mistral");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml() {
        let yaml = r#"
backend: remote
remote:
  url: "http://localhost:8000/chat"
  apiKeyEnv: MY_KEY
  timeout: 120
retrieval:
  topK: 3
  minScore: 0.1
retry:
  policy: reretrieve
logging:
  level: debug
  color: false
"#;
        let config = AppConfig::default().merge_yaml_str(yaml).unwrap();
        assert_eq!(config.backend, BackendKind::Remote);
        assert_eq!(
            config.remote.url.as_deref(),
            Some("http://localhost:8000/chat")
        );
        assert_eq!(config.remote.api_key_env, "MY_KEY");
        assert_eq!(config.remote.timeout, 120);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retry, RetryPolicy::Reretrieve);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert!(config.no_color);
        // Sections not present keep their defaults
        assert_eq!(config.local.model, "llama3.2");
    }

    #[test]
    fn test_merge_yaml_unknown_backend() {
        let result = AppConfig::default().merge_yaml_str("backend: carrier-pigeon\n");
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_local() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_remote_without_url() {
        let mut config = AppConfig::default();
        config.backend = BackendKind::Remote;
        config.api_key = Some("secret".to_string());
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_remote_without_key() {
        let mut config = AppConfig::default();
        config.backend = BackendKind::Remote;
        config.remote.url = Some("http://localhost:8000/chat".to_string());
        config.remote.api_key_env = "COSMIC_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        assert!(config.validate().is_err());

        config.api_key = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_unknown_embedder() {
        let mut config = AppConfig::default();
        config.embedding.provider = "word2vec".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let mut config = AppConfig::default();
        config.local.timeout = 0;
        assert!(config.validate().is_err());
        config.local.timeout = 601;
        assert!(config.validate().is_err());
        config.local.timeout = 120;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_missing_config_file() {
        let result = AppConfig::load_from(
            Some(std::env::temp_dir()),
            Some(PathBuf::from("/nonexistent/cosmic.yaml")),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_load_from_missing_workspace() {
        let result = AppConfig::load_from(Some(PathBuf::from("/nonexistent/workspace")), None);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!(BackendKind::parse("local"), Some(BackendKind::Local));
        assert_eq!(BackendKind::parse("Remote"), Some(BackendKind::Remote));
        assert_eq!(BackendKind::parse("ollama"), Some(BackendKind::Local));
        assert_eq!(BackendKind::parse("other"), None);
        assert_eq!(BackendKind::Remote.as_str(), "remote");
    }
}
