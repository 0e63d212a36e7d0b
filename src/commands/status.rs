// src/commands/status.rs
//! Show installed test packages and where they came from

use anyhow::{Context, Result};
use pr_test::{render_status, CommandRunner, Config, Ledger};

pub fn cmd_status(config: &Config, runner: &dyn CommandRunner) -> Result<()> {
    let ledger = Ledger::new(&config.marker_dir, runner);
    let report = ledger
        .list_grouped_by_job()
        .with_context(|| format!("Failed to read {}", config.marker_dir.display()))?;

    if report.is_empty() {
        println!("No packages installed by {}", config.tool_name);
        return Ok(());
    }

    print!("{}", render_status(&report));
    Ok(())
}
