// src/error.rs

//! Error types shared by the pr-test library

use crate::compression::CompressionError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while mutating, installing, or tracking packages
#[derive(Error, Debug)]
pub enum Error {
    /// The package archive could not be read or has no usable members
    #[error("Failed to read package archive {path}: {reason}")]
    ArchiveRead { path: PathBuf, reason: String },

    /// The control member has a compression suffix we cannot handle
    #[error("Unknown compression for control member '{member}'")]
    UnknownCompression { member: String },

    /// Control metadata could not be parsed
    #[error("Malformed control metadata: {0}")]
    MalformedControl(String),

    /// Querying an installed package's metadata failed
    #[error("Failed to query installed package '{package}': {reason}")]
    MetadataQuery { package: String, reason: String },

    /// The package manager returned a failure
    #[error("Package manager command `{command}` failed: {reason}")]
    PackageManager { command: String, reason: String },

    /// A provenance block was present but could not be decoded
    #[error("Invalid provenance block: {0}")]
    Provenance(String),

    /// Marker directory or marker file could not be updated
    #[error("Ledger error at {path}: {source}")]
    Ledger {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An external command could not be started
    #[error("Failed to run `{command}`: {source}")]
    CommandSpawn {
        command: String,
        source: std::io::Error,
    },

    /// Pull request reference could not be understood
    #[error("Invalid pull request reference: {0}")]
    InvalidPullRequest(String),

    /// Configuration file problems
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request or download failed
    #[error("Download failed: {0}")]
    DownloadError(String),

    /// Something we looked up does not exist
    #[error("Not found: {0}")]
    NotFoundError(String),

    #[error(transparent)]
    Compression(#[from] CompressionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;
