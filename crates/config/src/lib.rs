//! Configuration loading, validation, and management for factchat.
//!
//! Loads configuration from `~/.factchat/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.factchat/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Completion provider name ("openai", "openrouter", "ollama", ...)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Override the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

fn default_provider() -> String {
    "openai".into()
}

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
            .field("completion", &self.completion)
            .field("conversation", &self.conversation)
            .field("search", &self.search)
            .field("storage", &self.storage)
            .field("retrieval", &self.retrieval)
            .field("gateway", &self.gateway)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default)]
    pub frequency_penalty: f32,

    #[serde(default)]
    pub presence_penalty: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_image_size")]
    pub image_size: String,
}

fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_top_p() -> f32 {
    1.0
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_image_size() -> String {
    "1024x1024".into()
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            max_tokens: None,
            embedding_model: default_embedding_model(),
            image_size: default_image_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Name reported to the model as the current user
    #[serde(default = "default_username")]
    pub username: String,

    /// Summarize once more than this many turns are unsummarized
    #[serde(default = "default_summarize_after")]
    pub summarize_after_turns: usize,

    /// Turns kept verbatim after a summary
    #[serde(default = "default_keep_recent")]
    pub keep_recent_turns: usize,
}

fn default_username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "user".into())
}
fn default_summarize_after() -> usize {
    10
}
fn default_keep_recent() -> usize {
    5
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            summarize_after_turns: default_summarize_after(),
            keep_recent_turns: default_keep_recent(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_url")]
    pub base_url: String,

    #[serde(default = "default_engine")]
    pub engine: String,

    #[serde(default = "default_google_domain")]
    pub google_domain: String,

    /// Country
    #[serde(default = "default_gl")]
    pub gl: String,

    /// Language
    #[serde(default = "default_hl")]
    pub hl: String,

    /// Organic results requested per query
    #[serde(default = "default_num")]
    pub num: u32,
}

fn default_search_url() -> String {
    "https://serpapi.com".into()
}
fn default_engine() -> String {
    "google".into()
}
fn default_google_domain() -> String {
    "google.com".into()
}
fn default_gl() -> String {
    "us".into()
}
fn default_hl() -> String {
    "en".into()
}
fn default_num() -> u32 {
    2
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_search_url(),
            engine: default_engine(),
            google_domain: default_google_domain(),
            gl: default_gl(),
            hl: default_hl(),
            num: default_num(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("engine", &self.engine)
            .field("google_domain", &self.google_domain)
            .field("gl", &self.gl)
            .field("hl", &self.hl)
            .field("num", &self.num)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one JSON blob per fact
    #[serde(default = "default_blob_dir")]
    pub blob_dir: PathBuf,

    /// Where exported training files are written
    #[serde(default = "default_training_dir")]
    pub training_dir: PathBuf,

    /// Bulk delete of every fact; off unless explicitly enabled
    #[serde(default)]
    pub allow_kill_all_facts: bool,
}

fn default_blob_dir() -> PathBuf {
    AppConfig::config_dir().join("blobs")
}
fn default_training_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            blob_dir: default_blob_dir(),
            training_dir: default_training_dir(),
            allow_kill_all_facts: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Minimum cosine similarity for a snippet to be used as background
    #[serde(default = "default_min_score")]
    pub min_score: f32,
}

fn default_index_path() -> PathBuf {
    AppConfig::config_dir().join("index.jsonl")
}
fn default_min_score() -> f32 {
    0.75
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            min_score: default_min_score(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Browser origins allowed by CORS (the web front end)
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    5000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Upper bounds on every outbound call, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_provider_secs")]
    pub provider_secs: u64,

    #[serde(default = "default_tool_secs")]
    pub tool_secs: u64,

    #[serde(default = "default_retrieval_secs")]
    pub retrieval_secs: u64,

    #[serde(default = "default_storage_secs")]
    pub storage_secs: u64,
}

fn default_provider_secs() -> u64 {
    60
}
fn default_tool_secs() -> u64 {
    20
}
fn default_retrieval_secs() -> u64 {
    20
}
fn default_storage_secs() -> u64 {
    30
}

impl TimeoutConfig {
    pub fn provider(&self) -> Duration {
        Duration::from_secs(self.provider_secs)
    }

    pub fn tool(&self) -> Duration {
        Duration::from_secs(self.tool_secs)
    }

    pub fn retrieval(&self) -> Duration {
        Duration::from_secs(self.retrieval_secs)
    }

    pub fn storage(&self) -> Duration {
        Duration::from_secs(self.storage_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            provider_secs: default_provider_secs(),
            tool_secs: default_tool_secs(),
            retrieval_secs: default_retrieval_secs(),
            storage_secs: default_storage_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.factchat/config.toml).
    ///
    /// Environment overrides:
    /// - `FACTCHAT_API_KEY`, then `OPENAI_API_KEY` (when no key is configured)
    /// - `FACTCHAT_PROVIDER`, `FACTCHAT_MODEL`
    /// - `SERPAPI_API_KEY` (when no search key is configured)
    /// - `FACTCHAT_ALLOW_KILL_ALL_FACTS=1`
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

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("FACTCHAT_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("FACTCHAT_PROVIDER") {
            self.provider = provider;
        }

        if let Some(model) = lookup("FACTCHAT_MODEL") {
            self.completion.model = model;
        }

        if self.search.api_key.is_none() {
            self.search.api_key = lookup("SERPAPI_API_KEY");
        }

        if let Some(flag) = lookup("FACTCHAT_ALLOW_KILL_ALL_FACTS") {
            self.storage.allow_kill_all_facts = matches!(flag.as_str(), "1" | "true" | "yes");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".factchat")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err(ConfigError::ValidationError(
                "completion.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.completion.top_p <= 0.0 || self.completion.top_p > 1.0 {
            return Err(ConfigError::ValidationError(
                "completion.top_p must be in (0.0, 1.0]".into(),
            ));
        }

        if self.conversation.keep_recent_turns == 0 {
            return Err(ConfigError::ValidationError(
                "conversation.keep_recent_turns must be at least 1".into(),
            ));
        }

        if self.conversation.keep_recent_turns > self.conversation.summarize_after_turns {
            return Err(ConfigError::ValidationError(
                "conversation.keep_recent_turns must not exceed summarize_after_turns".into(),
            ));
        }

        Ok(())
    }

    /// Check if a provider API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            api_url: None,
            completion: CompletionConfig::default(),
            conversation: ConversationConfig::default(),
            search: SearchConfig::default(),
            storage: StorageConfig::default(),
            retrieval: RetrievalConfig::default(),
            gateway: GatewayConfig::default(),
            timeouts: TimeoutConfig::default(),
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
