// src/restore.rs

//! Put repository versions back over test packages
//!
//! Restoring selects ledger entries by repository or user, reinstalls the
//! selected packages from the configured apt sources, then drops markers
//! of every package that no longer carries provenance.

use crate::error::Result;
use crate::ledger::{Ledger, LedgerReport};
use crate::packages::PackageManager;
use std::fmt;
use tracing::{debug, info, warn};

/// Which ledger entries to restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestorePattern {
    All,
    /// Repository name or pull request author
    Match(String),
}

impl RestorePattern {
    pub fn parse(pattern: &str) -> Self {
        match pattern.trim() {
            "all" => Self::All,
            other => Self::Match(other.to_string()),
        }
    }

    /// Select the packages of every matching job, sorted
    pub fn select(&self, report: &LedgerReport) -> Vec<String> {
        let mut selected: Vec<String> = report
            .jobs
            .values()
            .filter(|entry| match self {
                Self::All => true,
                Self::Match(name) => entry.provenance.pr_repo == *name || entry.provenance.pr_user == *name,
            })
            .flat_map(|entry| entry.packages.iter().cloned())
            .collect();
        selected.sort();
        selected.dedup();
        selected
    }
}

impl fmt::Display for RestorePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Match(name) => f.write_str(name),
        }
    }
}

/// Outcome of a restore
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Packages handed to the package manager
    pub selected: Vec<String>,
    /// Markers removed
    pub erased: Vec<String>,
    /// Markers kept because the package still carries provenance
    pub retained: Vec<String>,
}

impl RestoreSummary {
    pub fn is_noop(&self) -> bool {
        self.selected.is_empty() && self.erased.is_empty() && self.retained.is_empty()
    }
}

pub struct RestoreEngine<'a> {
    ledger: &'a Ledger<'a>,
    apt: &'a PackageManager<'a>,
}

impl<'a> RestoreEngine<'a> {
    pub fn new(ledger: &'a Ledger<'a>, apt: &'a PackageManager<'a>) -> Self {
        Self { ledger, apt }
    }

    /// Reinstall matching packages and drop their markers
    ///
    /// A package manager failure aborts before any marker is touched.
    pub fn restore(&self, pattern: &RestorePattern) -> Result<RestoreSummary> {
        let report = self.ledger.list_grouped_by_job()?;
        let selected = pattern.select(&report);
        debug!("Pattern {} selected {:?}, invalid {:?}", pattern, selected, report.invalid);

        if selected.is_empty() && report.invalid.is_empty() {
            info!("Nothing to restore for {}", pattern);
            return Ok(RestoreSummary::default());
        }

        if !selected.is_empty() {
            info!("Restoring {} package(s): {}", selected.len(), selected.join(" "));
            self.apt.reinstall_fix_missing(&selected)?;
        }

        let mut summary = RestoreSummary {
            selected,
            ..Default::default()
        };

        let mut candidates: Vec<String> = summary.selected.iter().chain(&report.invalid).cloned().collect();
        candidates.sort();
        candidates.dedup();

        for package in candidates {
            if self.ledger.provenance(&package).is_some() {
                warn!("{} still carries test provenance after restore, keeping its marker", package);
                summary.retained.push(package);
            } else {
                self.ledger.erase(&package)?;
                summary.erased.push(package);
            }
        }

        Ok(summary)
    }
}
