//! Configuration loading, validation, and management for GroundChat.
//!
//! Secrets and service coordinates come from the environment (a `.env`
//! file in the working directory is honoured). Tunables can also be set in
//! `~/.groundchat/config.toml`. Environment values win over the file.
//!
//! Required settings are checked once at startup by
//! [`AppConfig::credentials`], which reports every missing key at once so a
//! misconfigured deployment fails before any request is sent.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable names.
pub mod env {
    pub const SEARCH_SERVICE: &str = "MY_SEARCH_SERVICE";
    pub const SEARCH_ADMIN_KEY: &str = "SEARCH_SERVICE_ADMIN_KEY";
    pub const INDEX_NAME: &str = "INDEX_NAME";
    pub const COMPLETION_API_KEY: &str = "OPENAI_API_KEY";
    pub const COMPLETION_API_BASE: &str = "OPENAI_API_BASE";
    pub const COMPLETION_API_VERSION: &str = "OPENAI_API_VERSION";
    pub const ENGINE: &str = "GROUNDCHAT_ENGINE";
    pub const TOKEN_MODEL: &str = "GROUNDCHAT_TOKEN_MODEL";
}

/// The root configuration structure.
///
/// Maps directly to `~/.groundchat/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Document search service
    #[serde(default)]
    pub search: SearchConfig,

    /// Chat completion service
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Context window management
    #[serde(default)]
    pub context: ContextConfig,

    /// Session seed and instruction texts
    #[serde(default)]
    pub session: SessionConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search service name; the endpoint is `https://{name}.search.windows.net`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    #[serde(default = "default_semantic_configuration")]
    pub semantic_configuration: String,

    #[serde(default = "default_query_language")]
    pub query_language: String,

    /// Documents attached to each turn
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_semantic_configuration() -> String {
    "semantictestconfig".into()
}
fn default_query_language() -> String {
    "en-us".into()
}
fn default_top_k() -> usize {
    3
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            service_name: None,
            admin_key: None,
            index_name: None,
            semantic_configuration: default_semantic_configuration(),
            query_language: default_query_language(),
            top_k: default_top_k(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("service_name", &self.service_name)
            .field("admin_key", &redact(&self.admin_key))
            .field("index_name", &self.index_name)
            .field("semantic_configuration", &self.semantic_configuration)
            .field("query_language", &self.query_language)
            .field("top_k", &self.top_k)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Resource base URL, e.g. `https://my-resource.openai.azure.com/`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Deployment name the completion request is routed to
    #[serde(default = "default_engine")]
    pub engine: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

fn default_api_version() -> String {
    "2023-07-01-preview".into()
}
fn default_engine() -> String {
    "gpt-35-turbo".into()
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: None,
            api_version: default_api_version(),
            engine: default_engine(),
            temperature: None,
        }
    }
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_base", &self.api_base)
            .field("api_version", &self.api_version)
            .field("engine", &self.engine)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Model whose tokenization rules are used for budget accounting
    #[serde(default = "default_token_model")]
    pub token_model: String,

    /// Estimated tokens above which the conversation is pruned
    #[serde(default = "default_prune_threshold")]
    pub prune_threshold: usize,

    /// System messages dropped per prune (the anchor is never dropped)
    #[serde(default = "default_prune_max_remove")]
    pub prune_max_remove: usize,

    /// Upper bound on each search or completion call, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<u64>,
}

fn default_token_model() -> String {
    "gpt-3.5-turbo-0613".into()
}
fn default_prune_threshold() -> usize {
    10_000
}
fn default_prune_max_remove() -> usize {
    4
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_model: default_token_model(),
            prune_threshold: default_prune_threshold(),
            prune_max_remove: default_prune_max_remove(),
            call_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// The anchor instruction, first message of every session
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Assistant greeting shown when the session opens
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Appended after the retrieved documents on every turn
    #[serde(default = "default_closing_instruction")]
    pub closing_instruction: String,
}

fn default_system_prompt() -> String {
    "You are an AI assistant that helps people find information.".into()
}
fn default_greeting() -> String {
    "Do you have a question about any of the transcripts in the database?".into()
}
fn default_closing_instruction() -> String {
    "Only answer questions based on the transcripts above. You may infer answers from the \
     transcript but be clear that there is no direct answer. If the answer is not found in \
     the transcript at all, answer 'I don't know'. If you need to reference a transcript \
     refer to it by its filename"
        .into()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            greeting: default_greeting(),
            closing_instruction: default_closing_instruction(),
        }
    }
}

/// The required secrets and coordinates, all present.
#[derive(Clone)]
pub struct Credentials {
    pub search_service: String,
    pub search_admin_key: String,
    pub index_name: String,
    pub completion_api_key: String,
    pub completion_api_base: String,
    pub completion_api_version: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("search_service", &self.search_service)
            .field("search_admin_key", &"[REDACTED]")
            .field("index_name", &self.index_name)
            .field("completion_api_key", &"[REDACTED]")
            .field("completion_api_base", &self.completion_api_base)
            .field("completion_api_version", &self.completion_api_version)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration: `.env`, then the config file (if any), then
    /// environment overrides. Validates tunables but not credentials.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(p) => tracing::debug!("Loaded environment from {}", p.display()),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Ignoring unreadable .env file: {e}"),
        }

        let default_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(path.unwrap_or(&default_path))?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file found at {}, using defaults", path.display());
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

    /// Overlay values from an environment lookup. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(env::SEARCH_SERVICE) {
            self.search.service_name = Some(v);
        }
        if let Some(v) = get(env::SEARCH_ADMIN_KEY) {
            self.search.admin_key = Some(v);
        }
        if let Some(v) = get(env::INDEX_NAME) {
            self.search.index_name = Some(v);
        }
        if let Some(v) = get(env::COMPLETION_API_KEY) {
            self.completion.api_key = Some(v);
        }
        if let Some(v) = get(env::COMPLETION_API_BASE) {
            self.completion.api_base = Some(v);
        }
        if let Some(v) = get(env::COMPLETION_API_VERSION) {
            self.completion.api_version = v;
        }
        if let Some(v) = get(env::ENGINE) {
            self.completion.engine = v;
        }
        if let Some(v) = get(env::TOKEN_MODEL) {
            self.context.token_model = v;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".groundchat")
    }

    /// Validate the tunables.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.context.prune_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "context.prune_threshold must be greater than 0".into(),
            ));
        }

        if self.search.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "search.top_k must be greater than 0".into(),
            ));
        }

        if let Some(t) = self.completion.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(
                    "completion.temperature must be between 0.0 and 2.0".into(),
                ));
            }
        }

        Ok(())
    }

    /// Names of required settings that are not set, as environment keys.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let required = [
            (env::SEARCH_SERVICE, &self.search.service_name),
            (env::SEARCH_ADMIN_KEY, &self.search.admin_key),
            (env::INDEX_NAME, &self.search.index_name),
            (env::COMPLETION_API_KEY, &self.completion.api_key),
            (env::COMPLETION_API_BASE, &self.completion.api_base),
        ];
        required
            .into_iter()
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| key)
            .collect()
    }

    /// Resolve every required setting, or fail naming all that are missing.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let missing = self.missing_required();
        if !missing.is_empty() {
            return Err(ConfigError::Missing {
                keys: missing.join(", "),
            });
        }

        let take = |v: &Option<String>| v.clone().unwrap_or_default();
        Ok(Credentials {
            search_service: take(&self.search.service_name),
            search_admin_key: take(&self.search.admin_key),
            index_name: take(&self.search.index_name),
            completion_api_key: take(&self.completion.api_key),
            completion_api_base: take(&self.completion.api_base),
            completion_api_version: self.completion.api_version.clone(),
        })
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

    #[error("Missing required configuration: {keys} (set them in the environment or a .env file)")]
    Missing { keys: String },
}
