//! Configuration loading, validation, and management for Switchyard.
//!
//! Loads configuration from `~/.switchyard/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.switchyard/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation backend (chat + embeddings)
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Knowledge store selection and retrieval tuning
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Qdrant connection, required when `memory.backend = "qdrant"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qdrant: Option<QdrantConfig>,

    /// Worker runtime settings
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Base URL; endpoints containing `.azure` are treated as Azure OpenAI
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Chat model or Azure deployment name
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Embedding model or Azure deployment name
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Network timeout for a single backend call
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".into()
}
fn default_chat_model() -> String {
    "gpt-4o".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-large".into()
}
fn default_temperature() -> f32 {
    0.8
}
fn default_top_p() -> f32 {
    1.0
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_backend_timeout_secs() -> u64 {
    300
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_backend_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl OpenAiConfig {
    pub fn is_azure(&self) -> bool {
        self.endpoint.to_lowercase().contains(".azure")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "none", "in_memory" or "qdrant"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Passages retrieved per knowledge lookup
    #[serde(default = "default_retrieval_limit")]
    pub retrieval_limit: usize,

    #[serde(default)]
    pub min_relevance: f32,
}

fn default_memory_backend() -> String {
    "none".into()
}
fn default_retrieval_limit() -> usize {
    2
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            retrieval_limit: default_retrieval_limit(),
            min_relevance: 0.0,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    pub endpoint: String,

    /// Dimension of the stored vectors; must match the embedding model
    pub vector_size: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for QdrantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantConfig")
            .field("endpoint", &self.endpoint)
            .field("vector_size", &self.vector_size)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Deadline for a correlated response to `send_request`
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Buffer size of the in-process transport
    #[serde(default = "default_transport_capacity")]
    pub transport_capacity: usize,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_transport_capacity() -> usize {
    1024
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            transport_capacity: default_transport_capacity(),
        }
    }
}

impl RuntimeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.switchyard/config.toml).
    ///
    /// Environment variables override the file:
    /// - `SWITCHYARD_API_KEY`, then `OPENAI_API_KEY` (only when no key is configured)
    /// - `SWITCHYARD_OPENAI_ENDPOINT`
    /// - `SWITCHYARD_MODEL`
    /// - `SWITCHYARD_QDRANT_ENDPOINT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|name| std::env::var(name).ok());
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

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.openai.api_key.is_none() {
            self.openai.api_key = lookup("SWITCHYARD_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(endpoint) = lookup("SWITCHYARD_OPENAI_ENDPOINT") {
            self.openai.endpoint = endpoint;
        }

        if let Some(model) = lookup("SWITCHYARD_MODEL") {
            self.openai.chat_model = model;
        }

        if let Some(endpoint) = lookup("SWITCHYARD_QDRANT_ENDPOINT") {
            match &mut self.qdrant {
                Some(q) => q.endpoint = endpoint,
                None => tracing::warn!(
                    "SWITCHYARD_QDRANT_ENDPOINT set but no [qdrant] section configures vector_size; ignoring"
                ),
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".switchyard")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.openai.temperature < 0.0 || self.openai.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "openai.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.openai.top_p <= 0.0 || self.openai.top_p > 1.0 {
            return Err(ConfigError::ValidationError(
                "openai.top_p must be in (0.0, 1.0]".into(),
            ));
        }

        if self.runtime.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "runtime.request_timeout_ms must be > 0".into(),
            ));
        }

        match self.memory.backend.as_str() {
            "none" | "in_memory" => {}
            "qdrant" => {
                let Some(qdrant) = &self.qdrant else {
                    return Err(ConfigError::ValidationError(
                        "memory.backend = \"qdrant\" requires a [qdrant] section".into(),
                    ));
                };
                if qdrant.endpoint.trim().is_empty() {
                    return Err(ConfigError::ValidationError("qdrant.endpoint is required".into()));
                }
                if qdrant.vector_size == 0 {
                    return Err(ConfigError::ValidationError(
                        "qdrant.vector_size must be > 0".into(),
                    ));
                }
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown memory.backend '{other}' (expected none, in_memory or qdrant)"
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.openai.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
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
