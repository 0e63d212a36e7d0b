// src/cli/mod.rs
//! CLI definitions for pr-test
//!
//! pr-test has a single command line with three modes:
//! - `pr-test <PULL_REQUEST>` - install the packages built for a pull request
//! - `pr-test --status` - show what is installed and where it came from
//! - `pr-test --restore <all|REPO|USER>` - put repository versions back
//!
//! The actual command implementations are in the `commands` module.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pr-test")]
#[command(version)]
#[command(about = "Install CI-built packages of a pull request and restore them later", long_about = None)]
pub struct Cli {
    /// Pull request: NUM (repository from git remotes), REPO#NUM, or its GitHub URL
    #[arg(value_name = "PULL_REQUEST", conflicts_with_all = ["status", "restore"])]
    pub pull_request: Option<String>,

    /// Show installed test packages grouped by CI job
    #[arg(long, conflicts_with = "restore")]
    pub status: bool,

    /// Restore repository versions: `all`, a repository name, or a user login
    #[arg(long, value_name = "PATTERN")]
    pub restore: Option<String>,

    /// Configuration file (default: $XDG_CONFIG_HOME/pr-test/config.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Accept the default answer of every prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Check that packages would install without changing the system
    #[arg(long)]
    pub dry_run: bool,
}

/// What the invocation asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Install(String),
    Status,
    Restore(String),
    /// Nothing requested
    Usage,
}

impl Cli {
    pub fn action(&self) -> Action {
        if self.status {
            Action::Status
        } else if let Some(pattern) = &self.restore {
            Action::Restore(pattern.clone())
        } else if let Some(pr) = &self.pull_request {
            Action::Install(pr.clone())
        } else {
            Action::Usage
        }
    }

    /// Default tracing filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_install_action() {
        let cli = Cli::try_parse_from(["pr-test", "-y", "--dry-run", "dde-dock#12"]).unwrap();
        assert_eq!(cli.action(), Action::Install("dde-dock#12".to_string()));
        assert!(cli.yes);
        assert!(cli.dry_run);
    }

    #[test]
    fn test_status_and_restore_actions() {
        let cli = Cli::try_parse_from(["pr-test", "--status", "-v"]).unwrap();
        assert_eq!(cli.action(), Action::Status);
        assert_eq!(cli.log_filter(), "debug");

        let cli = Cli::try_parse_from(["pr-test", "--restore", "alice"]).unwrap();
        assert_eq!(cli.action(), Action::Restore("alice".to_string()));
        assert_eq!(cli.log_filter(), "info");
    }

    #[test]
    fn test_modes_conflict() {
        assert!(Cli::try_parse_from(["pr-test", "--status", "--restore", "all"]).is_err());
        assert!(Cli::try_parse_from(["pr-test", "--status", "12"]).is_err());
    }

    #[test]
    fn test_no_arguments() {
        let cli = Cli::try_parse_from(["pr-test"]).unwrap();
        assert_eq!(cli.action(), Action::Usage);
    }
}
