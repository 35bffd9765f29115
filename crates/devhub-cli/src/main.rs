//! DevHub CLI - operator interface for the device onboarding hub.
//!
//! Runs the provisioning window (UDP discovery + TCP onboarding) and gives
//! terminal access to device queries, field updates, and removal.

mod cli;
mod commands;
mod error;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use devhub_core::store::FileStore;

use cli::{Cli, Commands};
use error::{exit_codes, CliError};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(exit_codes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let store = Arc::new(FileStore::new(data_dir(cli.data_dir)?)?);

    match cli.command {
        Commands::Onboard(args) => commands::run_onboard(args, store, cli.json).await,
        Commands::List => commands::run_list(store, cli.json).await,
        Commands::Show(args) => commands::run_show(args, store, cli.json).await,
        Commands::Set(args) => commands::run_set(args, store, cli.json).await,
        Commands::Remove(args) => commands::run_remove(args, store).await,
    }
}

/// Resolve the device data directory, defaulting to the platform data dir.
fn data_dir(override_dir: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(dir) = override_dir {
        return Ok(dir);
    }

    directories::ProjectDirs::from("", "", "devhub")
        .map(|dirs| dirs.data_dir().join("devices"))
        .ok_or_else(|| CliError::Other("could not resolve a data directory".to_string()))
}
