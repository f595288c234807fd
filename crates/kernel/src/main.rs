//! Beacon command line tool.

mod cli;
mod config;
mod db;
mod logging;
mod state;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing::{debug, warn};

use crate::cli::Cli;
use crate::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Some(words) = &cli.autocomplete {
        for completion in cli::complete(words) {
            println!("{completion}");
        }
        return ExitCode::SUCCESS;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let level = cli.log_level();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = Config::from_env().context("failed to load configuration")?;
    logging::init_tracing(&config.logging, level)?;
    for warning in &config.warnings {
        warn!("{warning}");
    }
    debug!(
        config_dir = %config.config_dir.display(),
        module_paths = ?config.module_paths,
        "configuration loaded"
    );

    cli::run(&command, config, cli.watch, cli.benchmark).await
}
