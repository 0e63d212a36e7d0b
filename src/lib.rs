// src/lib.rs

//! pr-test: try pull request builds on a Debian-based system
//!
//! Installs the packages CI built for a pull request, tagging each one with
//! where it came from, and later puts the repository versions back.
//!
//! # Architecture
//!
//! - Provenance travels with the package: it is embedded in the control
//!   `Description` before install and read back with `dpkg-query`
//! - The ledger only remembers names: one marker file per installed package
//! - Every external program runs through `runner::CommandRunner`
//! - Archive surgery (ar, tar, gzip, xz) is done in-process

pub mod compression;
pub mod config;
mod error;
pub mod ledger;
pub mod packages;
pub mod provenance;
pub mod remote;
pub mod restore;
pub mod runner;

pub use config::Config;
pub use error::{Error, Result};
pub use ledger::{render_status, JobEntry, Ledger, LedgerReport};
pub use packages::{PackageManager, PackageMutator};
pub use provenance::{ProvenanceRecord, PullRequestDetail, PullRequestId};
pub use restore::{RestoreEngine, RestorePattern, RestoreSummary};
pub use runner::{CommandOutput, CommandRunner, Elevation, SystemRunner};
#[cfg(any(test, feature = "test-utils"))]
pub use runner::ScriptedRunner;
