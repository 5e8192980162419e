//! Parlor CLI entry point.

use clap::Parser;

use parlor::cli::commands::{self, load_config};
use parlor::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Init { force, ref path } => commands::init::execute(path, force, cli.json).await,
        Commands::Run { listen } => match load_config(config_path) {
            Ok(config) => commands::run::execute(config, listen).await,
            Err(e) => Err(e),
        },
        Commands::Config(ref command) => load_config(config_path)
            .and_then(|config| commands::config::execute(command, &config, cli.json)),
    };

    if let Err(err) = result {
        parlor::cli::handle_error(err, cli.json);
    }
}
