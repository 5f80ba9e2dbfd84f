//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Backend name (used for logging and base URL defaults)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL override for the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model used for every completion
    #[serde(default = "default_model")]
    pub model: String,

    /// HTTP timeout for backend calls
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Turn store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Document retrieval settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Text-to-SQL analytics settings
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Web search tool settings
    #[serde(default)]
    pub web_search: WebSearchConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_request_timeout() -> u64 {
    120
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("agent", &self.agent)
            .field("store", &self.store)
            .field("retrieval", &self.retrieval)
            .field("analytics", &self.analytics)
            .field("web_search", &self.web_search)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum tool dispatches per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Malformed model responses tolerated per run
    #[serde(default = "default_max_parse_retries")]
    pub max_parse_retries: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_iterations() -> u32 {
    6
}
fn default_max_parse_retries() -> u32 {
    3
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    1000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_parse_retries: default_max_parse_retries(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite file for turns and documents (defaults to `~/.parley/parley.sqlite`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_store_backend() -> String {
    "sqlite".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

impl StoreConfig {
    /// Resolved SQLite path.
    pub fn sqlite_path(&self) -> PathBuf {
        self.path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| AppConfig::config_dir().join("parley.sqlite"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Documents returned per similarity search
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Logical collection the documents live in
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_top_k() -> usize {
    5
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_collection() -> String {
    "parley_documents".into()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            embedding_model: default_embedding_model(),
            collection: default_collection(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// SQLite database to query; analytics is disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Tables the model may query (empty = every table)
    #[serde(default = "default_tables")]
    pub tables: Vec<String>,

    /// Sample rows per table shown to the model
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,

    /// Value for the LIMIT clause of generated queries
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_tables() -> Vec<String> {
    vec!["extracted_entities".into()]
}
fn default_sample_rows() -> usize {
    2
}
fn default_limit() -> usize {
    5
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            database: None,
            tables: default_tables(),
            sample_rows: default_sample_rows(),
            limit: default_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_search_endpoint() -> String {
    "https://api.duckduckgo.com/".into()
}
fn default_search_timeout() -> u64 {
    15
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_search_endpoint(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Environment variables take precedence over the file:
    /// - `PARLEY_API_KEY`, then `OPENAI_API_KEY` (only if no key is configured)
    /// - `PARLEY_MODEL`
    /// - `PARLEY_API_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("PARLEY_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(model) = lookup("PARLEY_MODEL") {
            self.model = model;
        }
        if let Some(url) = lookup("PARLEY_API_URL") {
            self.api_url = Some(url);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.temperature < 0.0 || self.agent.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "agent.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.max_parse_retries == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_parse_retries must be at least 1".into(),
            ));
        }

        if !matches!(self.store.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "store.backend must be \"sqlite\" or \"memory\", got \"{}\"",
                self.store.backend
            )));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            api_url: None,
            model: default_model(),
            request_timeout_secs: default_request_timeout(),
            agent: AgentConfig::default(),
            store: StoreConfig::default(),
            retrieval: RetrievalConfig::default(),
            analytics: AnalyticsConfig::default(),
            web_search: WebSearchConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
