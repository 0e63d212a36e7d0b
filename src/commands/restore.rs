// src/commands/restore.rs

//! Restore command - put repository versions back over test packages
//!
//! Selected packages are reinstalled from the configured apt sources.
//! Markers are dropped for every package that no longer carries
//! provenance afterwards, including stale markers of packages that were
//! removed or replaced by other means.

use anyhow::{Context, Result};
use pr_test::{CommandRunner, Config, Ledger, PackageManager, RestoreEngine, RestorePattern};
use tracing::info;

pub fn cmd_restore(config: &Config, runner: &dyn CommandRunner, pattern: &str) -> Result<()> {
    let pattern = RestorePattern::parse(pattern);
    info!("Restoring packages matching: {}", pattern);

    let ledger = Ledger::new(&config.marker_dir, runner).with_elevation(config.elevation());
    let apt = PackageManager::new(runner, config.elevation());

    let summary = RestoreEngine::new(&ledger, &apt)
        .restore(&pattern)
        .with_context(|| format!("Failed to restore {}", pattern))?;

    if summary.is_noop() {
        println!("Nothing to restore for {}", pattern);
        return Ok(());
    }

    if !summary.selected.is_empty() {
        println!("Reinstalled: {}", summary.selected.join(" "));
    }
    if !summary.erased.is_empty() {
        println!("Forgotten:   {}", summary.erased.join(" "));
    }
    if !summary.retained.is_empty() {
        println!("Still from a pull request, kept: {}", summary.retained.join(" "));
    }
    Ok(())
}
