// src/remote/hub.rs

//! Read GitHub credentials from the `hub` command line tool's config
//!
//! `~/.config/hub` is YAML mapping host names to a list of accounts:
//!
//! ```yaml
//! github.com:
//! - user: alice
//!   oauth_token: 0123abcd
//!   protocol: https
//! ```
//!
//! Only the first account of each host is used.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const GITHUB_HOST: &str = "github.com";

/// One account entry of a hub host
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct HubHost {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub oauth_token: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub unix_socket: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubConfig {
    pub hosts: BTreeMap<String, HubHost>,
}

impl HubConfig {
    pub fn parse(content: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<HubHost>> =
            serde_yaml::from_str(content).map_err(|e| Error::Config(format!("invalid hub config: {e}")))?;

        let hosts = raw
            .into_iter()
            .filter_map(|(host, accounts)| accounts.into_iter().next().map(|account| (host, account)))
            .collect();

        Ok(Self { hosts })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn github_host(&self) -> Option<&HubHost> {
        self.hosts.get(GITHUB_HOST)
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("hub"))
}

/// Token for github.com from the hub config, if the file exists and has one
pub fn github_token() -> Result<Option<String>> {
    let Some(path) = default_path().filter(|p| p.exists()) else {
        return Ok(None);
    };

    let config = HubConfig::load(&path)?;
    let host = config
        .github_host()
        .ok_or_else(|| Error::NotFoundError(format!("host {} in {}", GITHUB_HOST, path.display())))?;

    Ok(host.oauth_token.clone().filter(|t| !t.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hub_config() {
        let config = HubConfig::parse(
            "github.com:\n- user: alice\n  oauth_token: 0123abcd\n  protocol: https\n",
        )
        .unwrap();

        let host = config.github_host().unwrap();
        assert_eq!(host.user.as_deref(), Some("alice"));
        assert_eq!(host.oauth_token.as_deref(), Some("0123abcd"));
        assert_eq!(host.protocol.as_deref(), Some("https"));
    }

    #[test]
    fn test_first_account_wins_and_empty_hosts_skipped() {
        let config = HubConfig::parse(
            "github.com:\n- user: a\n  oauth_token: one\n- user: b\n  oauth_token: two\nghe.example.com: []\n",
        )
        .unwrap();

        assert_eq!(config.hosts.len(), 1);
        assert_eq!(config.github_host().unwrap().oauth_token.as_deref(), Some("one"));
    }

    #[test]
    fn test_no_github_host() {
        let config = HubConfig::parse("ghe.example.com:\n- user: a\n").unwrap();
        assert!(config.github_host().is_none());
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(HubConfig::parse("github.com: [unclosed").is_err());
    }
}
