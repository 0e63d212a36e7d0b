// src/remote/jenkins.rs

//! Find the package artifacts of a CI job
//!
//! Job pages list their artifacts as plain links. Long artifact lists are
//! collapsed behind a script that assigns `.href = '...'`, so both forms
//! are recognised.

use super::HttpClient;
use crate::error::{Error, Result};
use crate::packages::DebFilename;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};
use url::Url;

static HREF_DEB: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"href="(\S+\.deb)">"#).unwrap());
static SCRIPT_HREF_DEB: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.href = '(\S+\.deb)'").unwrap());

/// Extract artifact URLs from a job page, resolved against the job URL
pub fn scrape_deb_urls(job_url: &str, html: &str) -> Result<Vec<Url>> {
    let base = job_base(job_url)?;

    let mut links: Vec<&str> = HREF_DEB.captures_iter(html).filter_map(|c| c.get(1)).map(|m| m.as_str()).collect();
    if links.is_empty() {
        debug!("No plain artifact links, trying collapsed list");
        links = SCRIPT_HREF_DEB
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .collect();
    }

    links
        .into_iter()
        .map(|link| {
            base.join(link)
                .map_err(|e| Error::DownloadError(format!("bad artifact link {link}: {e}")))
        })
        .collect()
}

/// Job URL with a trailing slash so relative links land inside the job
fn job_base(job_url: &str) -> Result<Url> {
    let with_slash = if job_url.ends_with('/') {
        job_url.to_string()
    } else {
        format!("{job_url}/")
    };
    Url::parse(&with_slash).map_err(|e| Error::DownloadError(format!("invalid job URL {job_url}: {e}")))
}

/// Last path segment of an artifact URL
pub fn url_file_name(url: &Url) -> Result<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
        .ok_or_else(|| Error::DownloadError(format!("no file name in {url}")))
}

/// One package artifact of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub url: Url,
    pub file_name: String,
    pub deb: DebFilename,
}

impl Artifact {
    pub fn from_url(url: Url) -> Result<Self> {
        let file_name = url_file_name(&url)?;
        let deb = DebFilename::parse(&file_name)?;
        Ok(Self { url, file_name, deb })
    }
}

/// Source of job artifacts
pub trait JobPage {
    /// Package artifacts listed on the job page
    fn artifacts(&self, job_url: &str) -> Result<Vec<Artifact>>;

    /// Download an artifact into `dir`, returning the local path
    fn download(&self, artifact: &Artifact, dir: &Path) -> Result<PathBuf>;
}

impl JobPage for HttpClient {
    fn artifacts(&self, job_url: &str) -> Result<Vec<Artifact>> {
        info!("Looking for packages on {}", job_url);
        let html = self.get_text(job_url)?;
        scrape_deb_urls(job_url, &html)?.into_iter().map(Artifact::from_url).collect()
    }

    fn download(&self, artifact: &Artifact, dir: &Path) -> Result<PathBuf> {
        let dest = dir.join(&artifact.file_name);
        self.download_file_with_progress(artifact.url.as_str(), &dest, &artifact.deb.name)?;
        Ok(dest)
    }
}
