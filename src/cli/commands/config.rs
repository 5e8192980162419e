//! Implementation of the `parlor config` commands.

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::cli::types::ConfigCommands;
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

const REDACTED: &str = "[REDACTED]";

/// Result of `config show`.
#[derive(Debug, Serialize)]
pub struct ConfigShowOutput {
    /// Effective configuration with secrets redacted
    pub config: Config,
}

impl CommandOutput for ConfigShowOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.config).unwrap_or_default()
    }
}

/// Result of `config validate`.
#[derive(Debug, Serialize)]
pub struct ConfigValidateOutput {
    /// Whether the configuration passed validation
    pub valid: bool,
    /// Summary line for humans
    pub message: String,
    /// Secrets `run` would refuse to start without
    pub missing_secrets: Vec<String>,
}

impl CommandOutput for ConfigValidateOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        for missing in &self.missing_secrets {
            lines.push(format!("  warning: {missing}"));
        }
        lines.join("\n")
    }
}

/// Copy of `config` with credentials replaced.
pub fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    let redact = |secret: &mut Option<String>| {
        if secret.as_deref().is_some_and(|s| !s.is_empty()) {
            *secret = Some(REDACTED.to_string());
        }
    };
    redact(&mut config.slack.bot_token);
    redact(&mut config.llm.api_key);
    config
}

/// `config` has already been loaded and validated by the caller.
pub fn execute(command: &ConfigCommands, config: &Config, json_mode: bool) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            output(
                &ConfigShowOutput {
                    config: redacted(config),
                },
                json_mode,
            );
        }
        ConfigCommands::Validate => {
            let missing_secrets = ConfigLoader::require_secrets(config)
                .err()
                .map(|e| e.to_string())
                .into_iter()
                .collect();
            output(
                &ConfigValidateOutput {
                    valid: true,
                    message: "Configuration is valid.".to_string(),
                    missing_secrets,
                },
                json_mode,
            );
        }
    }
    Ok(())
}
