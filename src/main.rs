//! Energy Runner CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;

use energy_runner::cli::{Cli, Commands};
use energy_runner::infrastructure::logging::LoggerImpl;
use energy_runner::{cancel_pair, ConfigLoader};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli.command, cli.config, cli.json).await {
        energy_runner::cli::handle_error(err, cli.json);
    }
}

async fn run(command: Commands, config: Option<std::path::PathBuf>, json: bool) -> Result<()> {
    let config = match config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let _logger = LoggerImpl::init(&config.logging).context("Failed to initialize logging")?;

    let (cancel_handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling current run");
            cancel_handle.cancel();
        }
    });

    match command {
        Commands::Run(args) => {
            energy_runner::cli::commands::run::execute(args, config, cancel, json).await
        }
        Commands::Experiment(args) => {
            energy_runner::cli::commands::experiment::execute(args, config, cancel, json).await
        }
    }
}
