// src/remote/mod.rs

//! Remote services: GitHub, the CI job pages, and artifact downloads
//!
//! Everything here is blocking. `HttpClient` wraps reqwest with the retry
//! and streaming behaviour shared by the GitHub API client and the job
//! page scraper.

pub mod github;
pub mod hub;
pub mod jenkins;
pub mod pull_ref;

pub use github::{GithubClient, PullRequestCache, PullRequestInfo, PullRequestSource};
pub use jenkins::{scrape_deb_urls, JobPage};
pub use pull_ref::PullRequestRef;

use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for a request that fails before any response
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// Blocking HTTP client with retry support
pub struct HttpClient {
    client: Client,
    max_retries: u32,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::DownloadError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Send a request, retrying transport failures
    ///
    /// HTTP error statuses are not retried; they become `DownloadError`, or
    /// `NotFoundError` for 404.
    pub fn send(&self, url: &str, build: impl Fn(&Client) -> RequestBuilder) -> Result<Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match build(&self.client).send() {
                Ok(response) => {
                    let status = response.status();
                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(Error::NotFoundError(url.to_string()));
                    }
                    if !status.is_success() {
                        return Err(Error::DownloadError(format!("HTTP {} from {}", status, url)));
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to fetch {url} after {attempt} attempts: {e}"
                        )));
                    }
                    warn!("Request attempt {} for {} failed: {}, retrying...", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    /// Fetch a page as text
    pub fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        self.send(url, |c| c.get(url))?
            .text()
            .map_err(|e| Error::DownloadError(format!("Failed to read response from {}: {}", url, e)))
    }

    /// Fetch and decode a JSON document
    pub fn get_json<T: DeserializeOwned>(&self, url: &str, build: impl Fn(&Client) -> RequestBuilder) -> Result<T> {
        debug!("GET {}", url);
        self.send(url, build)?
            .json()
            .map_err(|e| Error::DownloadError(format!("Failed to parse JSON from {}: {}", url, e)))
    }

    /// Download `url` to `dest_path`, showing a progress bar labelled `label`
    ///
    /// The body is staged in a temporary file beside `dest_path` and only
    /// persisted once complete.
    pub fn download_file_with_progress(&self, url: &str, dest_path: &Path, label: &str) -> Result<()> {
        info!("Downloading {} to {}", url, dest_path.display());

        let dir = dest_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;

        let mut response = self.send(url, |c| c.get(url))?;
        let bar = download_bar(response.content_length(), label);
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;

        let copied = io::copy(&mut response, &mut bar.wrap_write(staged.as_file_mut()));
        let bytes = match copied {
            Ok(bytes) => bytes,
            Err(e) => {
                bar.abandon_with_message(format!("{label} [failed]"));
                return Err(Error::DownloadError(format!("Failed to read {url}: {e}")));
            }
        };
        bar.finish_with_message(format!("{label} [done]"));
        debug!("Downloaded {} bytes of {}", bytes, label);

        staged.persist(dest_path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

fn download_bar(size: Option<u64>, label: &str) -> ProgressBar {
    let bar = match size {
        Some(size) => ProgressBar::new(size),
        None => ProgressBar::new_spinner(),
    };
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
    ) {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar.set_message(label.to_string());
    bar
}
