//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Top-level arguments.
#[derive(Parser)]
#[command(name = "parlor")]
#[command(about = "Parlor - chat assistant event core", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .parlor/config.yaml
    #[arg(short, long, global = true, env = "PARLOR_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Create the .parlor directory, default config and database
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,

        /// Target directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Run the assistant: webhook intake, event loop and scheduler
    Run {
        /// Address for the webhook server (overrides slack.listen_addr)
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// `config` subcommands.
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration with secrets redacted
    Show,

    /// Load and validate the configuration
    Validate,
}
