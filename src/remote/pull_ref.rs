// src/remote/pull_ref.rs

//! Pull request references given on the command line
//!
//! Accepted forms:
//! - `42` - repository taken from the git remotes of the current directory
//! - `dde-dock#42`
//! - `https://github.com/<org>/dde-dock/pull/42`

use crate::error::{Error, Result};
use crate::provenance::PullRequestId;
use crate::runner::CommandRunner;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static REPO_NUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\S+)#(\d+)$").unwrap());

/// A reference that may still need the local repository to resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullRequestRef {
    /// Bare number, repository from git remotes
    Number(u64),
    Id(PullRequestId),
}

impl PullRequestRef {
    pub fn parse(arg: &str, organization: &str) -> Result<Self> {
        let arg = arg.trim();

        if let Ok(num) = arg.parse::<u64>() {
            return Ok(Self::Number(num));
        }

        if let Some(caps) = REPO_NUM.captures(arg) {
            return Ok(Self::Id(PullRequestId::new(&caps[1], parse_num(&caps[2], arg)?)));
        }

        parse_pull_url(arg, organization).map(Self::Id)
    }

    /// Resolve to a full id, consulting `git config` for bare numbers
    pub fn resolve(self, runner: &dyn CommandRunner, organization: &str) -> Result<PullRequestId> {
        match self {
            Self::Id(id) => Ok(id),
            Self::Number(num) => Ok(PullRequestId::new(repo_from_git_config(runner, organization)?, num)),
        }
    }
}

fn parse_num(num: &str, arg: &str) -> Result<u64> {
    num.parse()
        .map_err(|_| Error::InvalidPullRequest(format!("{arg}: pull request number out of range")))
}

/// Parse `https://github.com/<organization>/<repo>/pull/<num>`
pub fn parse_pull_url(url: &str, organization: &str) -> Result<PullRequestId> {
    let pattern = format!(r"https://github\.com/{}/([^/]+)/pull/(\d+)", regex::escape(organization));
    let re = Regex::new(&pattern).map_err(|e| Error::InvalidPullRequest(e.to_string()))?;

    let caps = re
        .captures(url)
        .ok_or_else(|| Error::InvalidPullRequest(format!("{url}: expected NUM, REPO#NUM or a pull request URL")))?;

    Ok(PullRequestId::new(&caps[1], parse_num(&caps[2], url)?))
}

/// Find the repository name in the local git remotes
pub fn repo_from_git_config(runner: &dyn CommandRunner, organization: &str) -> Result<String> {
    let output = runner.run("git", &["config", "--local", "--get-regexp", r"remote\..*\.url"])?;
    if !output.success() {
        return Err(Error::InvalidPullRequest(format!(
            "cannot read git remotes: {}",
            output.failure_reason()
        )));
    }

    let repo = repo_from_remotes(&output.stdout_str(), organization)
        .ok_or_else(|| Error::InvalidPullRequest(format!("no github.com/{organization} repository in git remotes")))?;
    debug!("Repository from git remotes: {}", repo);
    Ok(repo)
}

/// First `github.com[:/]<organization>/<repo>` remote, `.git` trimmed
pub fn repo_from_remotes(remotes: &str, organization: &str) -> Option<String> {
    let pattern = format!(r"github\.com[:/]{}/(.+)$", regex::escape(organization));
    let re = Regex::new(&pattern).ok()?;

    remotes.lines().find_map(|line| {
        let caps = re.captures(line.trim())?;
        let repo = caps[1].trim_end_matches(".git");
        (!repo.is_empty()).then(|| repo.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, ScriptedRunner};

    #[test]
    fn test_parse_number() {
        assert_eq!(PullRequestRef::parse("42", "linuxdeepin").unwrap(), PullRequestRef::Number(42));
    }

    #[test]
    fn test_parse_repo_num() {
        assert_eq!(
            PullRequestRef::parse("dde-dock#42", "linuxdeepin").unwrap(),
            PullRequestRef::Id(PullRequestId::new("dde-dock", 42))
        );
    }

    #[test]
    fn test_parse_url() {
        assert_eq!(
            PullRequestRef::parse("https://github.com/linuxdeepin/dde-dock/pull/7/files", "linuxdeepin").unwrap(),
            PullRequestRef::Id(PullRequestId::new("dde-dock", 7))
        );
    }

    #[test]
    fn test_parse_url_other_org_rejected() {
        let err = PullRequestRef::parse("https://github.com/someone/dde-dock/pull/7", "linuxdeepin").unwrap_err();
        assert!(matches!(err, Error::InvalidPullRequest(_)));
        assert!(PullRequestRef::parse("dock", "linuxdeepin").is_err());
    }

    #[test]
    fn test_repo_from_remotes() {
        let remotes = "remote.origin.url git@github.com:someone/fork.git\n\
                       remote.upstream.url https://github.com/linuxdeepin/dde-dock.git\n";
        assert_eq!(repo_from_remotes(remotes, "linuxdeepin").as_deref(), Some("dde-dock"));
        assert_eq!(
            repo_from_remotes("remote.origin.url git@github.com:linuxdeepin/dtkcore\n", "linuxdeepin").as_deref(),
            Some("dtkcore")
        );
        assert_eq!(repo_from_remotes("", "linuxdeepin"), None);
    }

    #[test]
    fn test_resolve_number_via_git() {
        let runner = ScriptedRunner::new();
        runner.on(
            "git",
            &["config", "--local", "--get-regexp", r"remote\..*\.url"],
            CommandOutput::ok("remote.origin.url git@github.com:linuxdeepin/dde-dock.git\n"),
        );

        let id = PullRequestRef::Number(5).resolve(&runner, "linuxdeepin").unwrap();
        assert_eq!(id, PullRequestId::new("dde-dock", 5));
    }
}
