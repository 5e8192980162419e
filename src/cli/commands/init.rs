//! Implementation of the `parlor init` command.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::adapters::sqlite::initialize_database;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, DatabaseConfig};

/// Result of `init`.
#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    /// Whether initialization completed
    pub success: bool,
    /// Summary line for humans
    pub message: String,
    /// Directory `.parlor` was created under
    pub initialized_path: PathBuf,
    /// Directories created by this run
    pub directories_created: Vec<String>,
    /// Whether `config.yaml` was (re)written
    pub config_written: bool,
    /// Location of the migrated database
    pub database_path: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if !self.directories_created.is_empty() {
            lines.push("\nCreated directories:".to_string());
            for dir in &self.directories_created {
                lines.push(format!("  - {dir}"));
            }
        }
        if self.config_written {
            lines.push("\nWrote default configuration to .parlor/config.yaml".to_string());
        }
        lines.push(format!("Database ready at {}", self.database_path.display()));
        lines.join("\n")
    }
}

/// Create the `.parlor` directory under `path`.
pub async fn execute(path: &Path, force: bool, json_mode: bool) -> Result<()> {
    let target_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(path)
    };

    let parlor_dir = target_path.join(".parlor");
    let mut directories_created = vec![];

    for dir in [parlor_dir.clone(), parlor_dir.join("logs")] {
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let relative = dir
                .strip_prefix(&target_path)
                .unwrap_or(&dir)
                .to_string_lossy()
                .to_string();
            directories_created.push(relative);
        }
    }

    let config_path = parlor_dir.join("config.yaml");
    let config_written = force || !config_path.exists();
    if config_written {
        let yaml = serde_yaml::to_string(&Config::default())
            .context("Failed to render default configuration")?;
        fs::write(&config_path, yaml)
            .await
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
    }

    let database_path = parlor_dir.join("parlor.db");
    let database = DatabaseConfig {
        path: database_path.to_string_lossy().to_string(),
        ..DatabaseConfig::default()
    };
    let pool = initialize_database(&database)
        .await
        .context("Failed to initialize database")?;
    pool.close().await;

    let output_data = InitOutput {
        success: true,
        message: "Project initialized successfully.".to_string(),
        initialized_path: target_path,
        directories_created,
        config_written,
        database_path,
    };

    output(&output_data, json_mode);
    Ok(())
}
