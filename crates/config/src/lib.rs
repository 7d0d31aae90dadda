//! Configuration loading, validation, and management for taskloop.
//!
//! Loads configuration from `~/.taskloop/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful task management assistant. \
You help users organize, track, and complete their tasks effectively. \
Use the available tools to read and update task files in the working directory.";

/// The root configuration structure.
///
/// Maps directly to `~/.taskloop/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Anthropic API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the Messages API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature; provider default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// System instructions sent with every request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Directory the tools operate in; the current directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Per-turn limits for the agent loop
    #[serde(default)]
    pub agent: AgentSettings,

    /// Tool execution settings
    #[serde(default)]
    pub tools: ToolSettings,

    /// Model pricing used for spend estimates
    #[serde(default)]
    pub pricing: PricingConfig,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
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
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("system_prompt", &self.system_prompt)
            .field("working_dir", &self.working_dir)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .field("pricing", &self.pricing)
            .finish()
    }
}

/// Limits that stop a runaway turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Maximum model calls within one turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Maximum estimated spend per turn in USD; unlimited when unset
    #[serde(default = "default_max_budget_usd", skip_serializing_if = "Option::is_none")]
    pub max_budget_usd: Option<f64>,
}

fn default_max_iterations() -> u32 {
    25
}
fn default_max_budget_usd() -> Option<f64> {
    Some(1.0)
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_budget_usd: default_max_budget_usd(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Timeout for the `bash` tool
    #[serde(default = "default_bash_timeout")]
    pub bash_timeout_secs: u64,

    /// Timeout for the `grep` tool
    #[serde(default = "default_grep_timeout")]
    pub grep_timeout_secs: u64,
}

fn default_bash_timeout() -> u64 {
    30
}
fn default_grep_timeout() -> u64 {
    10
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            bash_timeout_secs: default_bash_timeout(),
            grep_timeout_secs: default_grep_timeout(),
        }
    }
}

/// Per-million-token pricing for the configured model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Price per 1M input tokens in USD
    #[serde(default = "default_input_per_m")]
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD
    #[serde(default = "default_output_per_m")]
    pub output_per_m: f64,
}

fn default_input_per_m() -> f64 {
    3.0
}
fn default_output_per_m() -> f64 {
    15.0
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_m: default_input_per_m(),
            output_per_m: default_output_per_m(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, or the default path when `None`.
    ///
    /// Environment variables take priority over the file:
    /// - `TASKLOOP_API_KEY`, then `ANTHROPIC_API_KEY`
    /// - `TASKLOOP_MODEL`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_dir().join("config.toml"),
        };
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

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("TASKLOOP_API_KEY").or_else(|| lookup("ANTHROPIC_API_KEY")) {
            self.api_key = Some(key);
        }

        if let Some(model) = lookup("TASKLOOP_MODEL") {
            self.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".taskloop")
    }

    /// The directory tools operate in.
    pub fn resolved_working_dir(&self) -> PathBuf {
        match &self.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(t) = self.temperature
            && !(0.0..=1.0).contains(&t)
        {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 1.0".into(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError("max_tokens must be > 0".into()));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be > 0".into(),
            ));
        }

        if let Some(budget) = self.agent.max_budget_usd
            && budget <= 0.0
        {
            return Err(ConfigError::ValidationError(
                "agent.max_budget_usd must be > 0".into(),
            ));
        }

        if self.tools.bash_timeout_secs == 0 || self.tools.grep_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tool timeouts must be > 0".into(),
            ));
        }

        if self.pricing.input_per_m < 0.0 || self.pricing.output_per_m < 0.0 {
            return Err(ConfigError::ValidationError(
                "pricing must not be negative".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Render the configuration as TOML, without the API key.
    pub fn to_toml(&self) -> String {
        let redacted = Self {
            api_key: None,
            ..self.clone()
        };
        toml::to_string_pretty(&redacted).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: None,
            system_prompt: default_system_prompt(),
            working_dir: None,
            agent: AgentSettings::default(),
            tools: ToolSettings::default(),
            pricing: PricingConfig::default(),
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
