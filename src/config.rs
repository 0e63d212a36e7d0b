// src/config.rs
//! Configuration file parsing
//!
//! Supports a TOML configuration file with the following layout:
//! - top level - tool name, organization, directories, elevation
//! - [github] - API endpoint and access token
//!
//! Every key is optional. A missing file at the default location means
//! defaults; an explicitly given file must exist.

use crate::error::{Error, Result};
use crate::remote::hub;
use crate::runner::Elevation;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable consulted for a GitHub token
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// TOML configuration file structure
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Name written into provenance headers
    #[serde(default = "default_tool_name")]
    pub tool_name: String,

    /// GitHub organization owning the repositories under test
    #[serde(default = "default_organization")]
    pub organization: String,

    /// Directory holding one marker file per installed package
    #[serde(default = "default_marker_dir")]
    pub marker_dir: PathBuf,

    /// Where downloaded artifacts land
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Where modified copies of artifacts land
    #[serde(default = "default_modified_dir")]
    pub modified_dir: PathBuf,

    /// Command prefix for privileged operations (empty disables)
    #[serde(default = "default_elevate")]
    pub elevate: Vec<String>,

    /// Give test packages the locally known version of the package
    #[serde(default = "default_true")]
    pub rewrite_version: bool,

    #[serde(default)]
    pub github: GithubSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tool_name: default_tool_name(),
            organization: default_organization(),
            marker_dir: default_marker_dir(),
            download_dir: default_download_dir(),
            modified_dir: default_modified_dir(),
            elevate: default_elevate(),
            rewrite_version: true,
            github: GithubSection::default(),
        }
    }
}

/// GitHub API settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GithubSection {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Access token; unauthenticated requests are rate limited hard
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for GithubSection {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
        }
    }
}

fn default_tool_name() -> String {
    "pr-test".to_string()
}

fn default_organization() -> String {
    "linuxdeepin".to_string()
}

fn default_marker_dir() -> PathBuf {
    PathBuf::from("/var/lib/pr-test")
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("/tmp/pr-test/deb_download")
}

fn default_modified_dir() -> PathBuf {
    PathBuf::from("/tmp/pr-test/deb_modified")
}

fn default_elevate() -> Vec<String> {
    vec!["sudo".to_string()]
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Default config file location, `$XDG_CONFIG_HOME/pr-test/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pr-test").join("config.toml"))
    }

    /// Parse and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse and validate config text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given, else the default file if it exists, else defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                debug!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => {
                debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.tool_name.trim().is_empty() {
            return Err(Error::Config("tool_name must not be empty".to_string()));
        }
        if self.organization.trim().is_empty() {
            return Err(Error::Config("organization must not be empty".to_string()));
        }

        for (key, dir) in [
            ("marker_dir", &self.marker_dir),
            ("download_dir", &self.download_dir),
            ("modified_dir", &self.modified_dir),
        ] {
            if !dir.is_absolute() {
                return Err(Error::Config(format!("{} must be an absolute path, got {}", key, dir.display())));
            }
        }

        if self.download_dir == self.modified_dir {
            return Err(Error::Config("download_dir and modified_dir must differ".to_string()));
        }

        url::Url::parse(&self.github.api_url)
            .map_err(|e| Error::Config(format!("invalid github.api_url {}: {}", self.github.api_url, e)))?;

        Ok(())
    }

    pub fn elevation(&self) -> Elevation {
        Elevation::new(self.elevate.clone())
    }

    /// GitHub token from config, `GITHUB_TOKEN`, or the hub config, in that order
    pub fn github_token(&self) -> Option<String> {
        if let Some(token) = self.github.token.as_ref().filter(|t| !t.is_empty()) {
            return Some(token.clone());
        }

        if let Ok(token) = std::env::var(GITHUB_TOKEN_ENV)
            && !token.is_empty()
        {
            debug!("Using GitHub token from {}", GITHUB_TOKEN_ENV);
            return Some(token);
        }

        match hub::github_token() {
            Ok(token) => token,
            Err(e) => {
                debug!("No token from hub config: {}", e);
                None
            }
        }
    }
}
