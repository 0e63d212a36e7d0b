// src/main.rs

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use pr_test::{Config, SystemRunner};
use tracing::debug;

mod cli;
mod commands;

use cli::{Action, Cli};
use commands::InstallOptions;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_filter())),
        )
        .init();

    let config = Config::load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;
    debug!("Configuration: {:?}", config);

    let runner = SystemRunner;

    match cli.action() {
        Action::Install(reference) => commands::cmd_install(
            &config,
            &runner,
            &reference,
            InstallOptions {
                assume_yes: cli.yes,
                dry_run: cli.dry_run,
            },
        ),
        Action::Status => commands::cmd_status(&config, &runner),
        Action::Restore(pattern) => commands::cmd_restore(&config, &runner, &pattern),
        Action::Usage => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}
