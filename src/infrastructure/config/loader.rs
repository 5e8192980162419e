//! Loading and validating [`Config`](crate::domain::models::Config).

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Unknown log level
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unknown log format
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// Unknown rotation policy
    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    /// Database path is empty
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    /// Pool size is zero
    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    /// A tick interval is zero; carries the field name
    #[error("Invalid scheduler interval: {0} must be greater than 0")]
    InvalidInterval(&'static str),

    /// History limit is zero
    #[error("Invalid history_limit: {0}. Must be at least 1")]
    InvalidHistoryLimit(u32),

    /// Token limit is zero
    #[error("Invalid max_tokens: {0}. Must be at least 1")]
    InvalidMaxTokens(u32),

    /// Too many retries configured
    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    /// Initial backoff exceeds the maximum
    InvalidBackoff(u64, u64),

    /// A required secret is unset; carries the key and its env var
    #[error("Missing required setting {0} (set it in the config file or via {1})")]
    MissingSecret(&'static str, &'static str),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .parlor/config.yaml (project config)
    /// 3. .parlor/local.yaml (local overrides, optional)
    /// 4. Environment variables (PARLOR_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".parlor/config.yaml"))
            .merge(Yaml::file(".parlor/local.yaml"))
            .merge(Env::prefixed("PARLOR_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring environment
    /// overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("PARLOR_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        // Database
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        // Logging
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        // Scheduler
        let intervals = [
            ("scheduler.check_interval_ms", config.scheduler.check_interval_ms),
            ("scheduler.summary_interval_ms", config.scheduler.summary_interval_ms),
            (
                "scheduler.channel_sync_interval_ms",
                config.scheduler.channel_sync_interval_ms,
            ),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::InvalidInterval(name));
        }

        // Assistant
        if config.assistant.history_limit == 0 {
            return Err(ConfigError::InvalidHistoryLimit(
                config.assistant.history_limit,
            ));
        }

        // LLM
        if config.llm.max_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens(config.llm.max_tokens));
        }

        if config.llm.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.llm.max_retries));
        }

        if config.llm.initial_backoff_ms >= config.llm.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.llm.initial_backoff_ms,
                config.llm.max_backoff_ms,
            ));
        }

        Ok(())
    }

    /// Check that the credentials `run` needs are present.
    pub fn require_secrets(config: &Config) -> Result<(), ConfigError> {
        let missing = |secret: &Option<String>| secret.as_deref().map_or(true, str::is_empty);

        if missing(&config.slack.bot_token) {
            return Err(ConfigError::MissingSecret(
                "slack.bot_token",
                "PARLOR_SLACK__BOT_TOKEN",
            ));
        }
        if missing(&config.llm.api_key) {
            return Err(ConfigError::MissingSecret("llm.api_key", "PARLOR_LLM__API_KEY"));
        }
        Ok(())
    }
}
