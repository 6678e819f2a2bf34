//! upkeep CLI

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use upkeep_cli::cmd::{self, RunOptions};
use upkeep_cli::{Cli, Commands};

/// Exit code for invalid parameters, shared with clap's usage errors.
const INVALID_PARAMETER: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_directive = if cli.verbose { "upkeep=debug" } else { "upkeep=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Completions { shell } = cli.command {
        cmd::completions::completions(shell);
        return Ok(ExitCode::SUCCESS);
    }

    let options = match RunOptions::resolve(&cli) {
        Ok(options) => options,
        Err(e) => {
            tracing::error!("{e}");
            return Ok(ExitCode::from(INVALID_PARAMETER));
        }
    };

    match cli.command {
        Commands::Check => cmd::check::check(&options).await,
        Commands::Detect { json } => cmd::detect::detect(&options, json),
        Commands::Update => cmd::update::update(&options).await,
        Commands::Id => {
            cmd::id::id();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions { .. } => Ok(ExitCode::SUCCESS),
    }
}
