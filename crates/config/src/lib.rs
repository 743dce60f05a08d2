//! Configuration loading, validation, and management for Sage.
//!
//! Loads configuration from `~/.sage/config.toml` (or an explicit path) with
//! environment variable overrides. Every field has a default, so an absent
//! file yields a working configuration. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.sage/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Persona settings
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Text-completion backend and generation settings
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Knowledge base settings
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Web search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Conversation session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Subject the assistant specializes in; also the search keyword by default
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Display name used in the liveness message and console banner
    #[serde(default = "default_assistant_name")]
    pub name: String,
}

fn default_domain() -> String {
    "SAP".into()
}
fn default_assistant_name() -> String {
    "SAP AI Assistant".into()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            name: default_assistant_name(),
        }
    }
}

/// Supported completion backends.
pub const BACKENDS: &[&str] = &["openai_compat", "ollama", "local"];

#[derive(Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// One of [`BACKENDS`]
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Base URL of the completion server (backend default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model name, preset alias, or path to a GGUF file
    #[serde(default = "default_model")]
    pub model: String,

    /// Bearer token for servers that require one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,

    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

fn default_backend() -> String {
    "openai_compat".into()
}
fn default_model() -> String {
    "tinyllama".into()
}
fn default_max_tokens() -> u32 {
    200
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.9
}
fn default_top_k() -> usize {
    20
}
fn default_repetition_penalty() -> f32 {
    1.1
}
fn default_completion_timeout() -> u64 {
    300
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            base_url: None,
            model: default_model(),
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            repetition_penalty: default_repetition_penalty(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("backend", &self.backend)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("top_k", &self.top_k)
            .field("repetition_penalty", &self.repetition_penalty)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Directory scanned once at startup
    #[serde(default = "default_knowledge_dir")]
    pub dir: PathBuf,

    /// File extensions treated as knowledge documents
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_knowledge_dir() -> PathBuf {
    PathBuf::from("knowledge_base")
}
fn default_extensions() -> Vec<String> {
    vec!["txt".into()]
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            dir: default_knowledge_dir(),
            extensions: default_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Keyword forced into every query; falls back to `assistant.domain`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,

    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_max_results() -> usize {
    3
}
fn default_search_endpoint() -> String {
    "https://html.duckduckgo.com/html/".into()
}
fn default_search_timeout() -> u64 {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_results: default_max_results(),
            keyword: None,
            endpoint: default_search_endpoint(),
            timeout_secs: default_search_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Exchanges retained per session; oldest are evicted first
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    #[serde(default = "default_max_session_id_chars")]
    pub max_session_id_chars: usize,
}

fn default_max_history() -> usize {
    5
}
fn default_max_message_chars() -> usize {
    4000
}
fn default_max_session_id_chars() -> usize {
    128
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            max_message_chars: default_max_message_chars(),
            max_session_id_chars: default_max_session_id_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// `["*"]` allows any origin
    #[serde(default = "default_cors_origins")]
    pub cors_allow_origins: Vec<String>,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_allow_origins: default_cors_origins(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.sage/config.toml).
    ///
    /// Environment variables override file values:
    /// - `SAGE_COMPLETION_BACKEND`
    /// - `SAGE_COMPLETION_URL`
    /// - `SAGE_MODEL`
    /// - `SAGE_KNOWLEDGE_DIR`
    /// - `SAGE_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides and validate.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
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

    /// Apply overrides from a key lookup (the environment in production).
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(backend) = lookup("SAGE_COMPLETION_BACKEND") {
            self.completion.backend = backend;
        }
        if let Some(url) = lookup("SAGE_COMPLETION_URL") {
            self.completion.base_url = Some(url);
        }
        if let Some(model) = lookup("SAGE_MODEL") {
            self.completion.model = model;
        }
        if let Some(dir) = lookup("SAGE_KNOWLEDGE_DIR") {
            self.knowledge.dir = PathBuf::from(dir);
        }
        if self.completion.api_key.is_none() {
            self.completion.api_key = lookup("SAGE_API_KEY");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".sage")
    }

    /// The keyword forced into search queries.
    pub fn search_keyword(&self) -> &str {
        self.search
            .keyword
            .as_deref()
            .unwrap_or(&self.assistant.domain)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !BACKENDS.contains(&self.completion.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown completion backend '{}' (expected one of: {})",
                self.completion.backend,
                BACKENDS.join(", ")
            )));
        }

        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err(ConfigError::ValidationError(
                "completion.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        // Written so that NaN fails the check.
        if !(self.completion.top_p > 0.0 && self.completion.top_p <= 1.0) {
            return Err(ConfigError::ValidationError(
                "completion.top_p must be in (0.0, 1.0]".into(),
            ));
        }

        if self.completion.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "completion.top_k must be > 0".into(),
            ));
        }

        if !(self.completion.repetition_penalty.is_finite()
            && self.completion.repetition_penalty > 0.0)
        {
            return Err(ConfigError::ValidationError(
                "completion.repetition_penalty must be a positive number".into(),
            ));
        }

        if self.completion.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "completion.max_tokens must be > 0".into(),
            ));
        }

        if self.session.max_history == 0 {
            return Err(ConfigError::ValidationError(
                "session.max_history must be > 0".into(),
            ));
        }

        if self.search.max_results == 0 {
            return Err(ConfigError::ValidationError(
                "search.max_results must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// A copy safe to print: the API key, if any, is replaced with a marker.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.completion.api_key.is_some() {
            config.completion.api_key = Some(redact(&self.completion.api_key).to_string());
        }
        config
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
