// src/remote/github.rs

//! Pull request lookup through the GitHub REST API
//!
//! A pull request is useful to us once CI has built it: the job URL comes
//! from the first successful commit status of the pull request's head.

use super::HttpClient;
use crate::error::{Error, Result};
use crate::provenance::{PullRequestDetail, PullRequestId};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Suffix of status links that point at the job's console log
const CONSOLE_SUFFIX: &str = "/console";

/// A pull request together with the CI job that built it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestInfo {
    pub detail: PullRequestDetail,
    pub job_url: String,
}

/// Anything that can resolve a pull request to its CI job
pub trait PullRequestSource {
    fn pull_request(&self, id: &PullRequestId) -> Result<PullRequestInfo>;
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiRepo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiBranch {
    sha: String,
    #[serde(default)]
    repo: Option<ApiRepo>,
}

#[derive(Debug, Deserialize)]
struct ApiPullRequest {
    number: u64,
    html_url: String,
    title: String,
    state: String,
    user: ApiUser,
    head: ApiBranch,
    base: ApiBranch,
}

/// One commit status as returned by the statuses endpoint
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CommitStatus {
    pub state: String,
    #[serde(default)]
    pub target_url: Option<String>,
}

/// Job URL from the first successful status
///
/// Without a successful status the error points at the first status link,
/// which is usually the failed or pending build.
pub fn job_url_from_statuses(statuses: &[CommitStatus]) -> Result<String> {
    match statuses.iter().find(|s| s.state == "success") {
        Some(status) => {
            let target = status
                .target_url
                .as_deref()
                .filter(|url| !url.is_empty())
                .ok_or_else(|| Error::NotFoundError("target url of successful status is empty".to_string()))?;
            Ok(target.strip_suffix(CONSOLE_SUFFIX).unwrap_or(target).to_string())
        }
        None => {
            let mut msg = "successful CI status".to_string();
            if let Some(url) = statuses
                .first()
                .and_then(|s| s.target_url.as_deref())
                .filter(|url| !url.is_empty())
            {
                msg.push_str(&format!(", please see {url}"));
            }
            Err(Error::NotFoundError(msg))
        }
    }
}

/// GitHub REST API client
pub struct GithubClient<'a> {
    http: &'a HttpClient,
    api_url: String,
    organization: String,
    token: Option<String>,
}

impl<'a> GithubClient<'a> {
    pub fn new(http: &'a HttpClient, api_url: &str, organization: &str, token: Option<String>) -> Self {
        if token.is_none() {
            info!("No GitHub token configured, requests are unauthenticated");
        }
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            organization: organization.to_string(),
            token,
        }
    }

    fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.http.get_json(url, |client| {
            let request = client
                .get(url)
                .header(reqwest::header::ACCEPT, "application/vnd.github+json");
            match &self.token {
                Some(token) => request.bearer_auth(token),
                None => request,
            }
        })
    }

    fn repo_url(&self, repo: &str) -> String {
        format!("{}/repos/{}/{}", self.api_url, self.organization, repo)
    }
}

impl PullRequestSource for GithubClient<'_> {
    fn pull_request(&self, id: &PullRequestId) -> Result<PullRequestInfo> {
        info!("Looking up pull request {}", id);

        let pr: ApiPullRequest = self.get(&format!("{}/pulls/{}", self.repo_url(&id.repo), id.num))?;
        if pr.head.sha.is_empty() {
            return Err(Error::NotFoundError(format!("head commit of {id}")));
        }

        let statuses: Vec<CommitStatus> =
            self.get(&format!("{}/commits/{}/statuses", self.repo_url(&id.repo), pr.head.sha))?;
        debug!("{} statuses for {}", statuses.len(), pr.head.sha);
        let job_url = job_url_from_statuses(&statuses)?;

        let repo = pr.base.repo.map(|r| r.name).unwrap_or_else(|| id.repo.clone());
        Ok(PullRequestInfo {
            detail: PullRequestDetail {
                id: PullRequestId::new(repo, pr.number),
                url: pr.html_url,
                user: pr.user.login,
                title: pr.title,
                state: pr.state,
            },
            job_url,
        })
    }
}

/// Memoises lookups of another source for the lifetime of the cache
pub struct PullRequestCache<S> {
    source: S,
    entries: RefCell<BTreeMap<PullRequestId, PullRequestInfo>>,
}

impl<S: PullRequestSource> PullRequestCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            entries: RefCell::new(BTreeMap::new()),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl<S: PullRequestSource> PullRequestSource for PullRequestCache<S> {
    fn pull_request(&self, id: &PullRequestId) -> Result<PullRequestInfo> {
        if let Some(info) = self.entries.borrow().get(id) {
            debug!("Pull request {} served from cache", id);
            return Ok(info.clone());
        }

        let info = self.source.pull_request(id)?;
        self.entries.borrow_mut().insert(id.clone(), info.clone());
        Ok(info)
    }
}
