// src/commands/install.rs
//! Install the packages CI built for a pull request

use super::prompt::ask_yes_no;
use anyhow::{Context, Result};
use pr_test::packages::{PackageManager, PackageMutator};
use pr_test::remote::jenkins::Artifact;
use pr_test::remote::{
    GithubClient, HttpClient, JobPage, PullRequestCache, PullRequestInfo, PullRequestRef, PullRequestSource,
};
use pr_test::{CommandRunner, Config, Ledger, ProvenanceRecord};
use tracing::{debug, info};

/// Package name suffixes not installed unless asked for
const OPTIONAL_SUFFIXES: &[&str] = &["-dev", "-dbg", "-dbgsym"];

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Accept default answers without prompting
    pub assume_yes: bool,
    /// Simulate installs and record nothing
    pub dry_run: bool,
}

/// Whether a package is offered for install by default
pub fn default_answer(package: &str) -> bool {
    !OPTIONAL_SUFFIXES.iter().any(|suffix| package.ends_with(suffix))
}

/// Install a pull request given on the command line
pub fn cmd_install(config: &Config, runner: &dyn CommandRunner, reference: &str, options: InstallOptions) -> Result<()> {
    let id = PullRequestRef::parse(reference, &config.organization)?
        .resolve(runner, &config.organization)
        .context("Failed to determine the pull request")?;

    let http = HttpClient::new()?;
    let github = PullRequestCache::new(GithubClient::new(
        &http,
        &config.github.api_url,
        &config.organization,
        config.github_token(),
    ));

    let info = github
        .pull_request(&id)
        .with_context(|| format!("Failed to look up pull request {}", id))?;
    print_pull_request(&info);

    install_job(config, runner, &http, &info, options)
}

fn print_pull_request(info: &PullRequestInfo) {
    let detail = &info.detail;
    println!("Pull request: {}", detail.id);
    println!("  Title: {}", detail.title);
    println!("  State: {}", detail.state);
    println!("  User:  {}", detail.user);
    println!("  Job:   {}", info.job_url);
}

/// Offer, download, mutate, install and record each artifact of the job
///
/// Packages installed before a failure stay installed and recorded.
pub fn install_job(
    config: &Config,
    runner: &dyn CommandRunner,
    jobs: &dyn JobPage,
    info: &PullRequestInfo,
    options: InstallOptions,
) -> Result<()> {
    let artifacts = jobs
        .artifacts(&info.job_url)
        .with_context(|| format!("Failed to list packages of {}", info.job_url))?;
    if artifacts.is_empty() {
        println!("No packages found at {}", info.job_url);
        return Ok(());
    }

    let mutator = PackageMutator::new(runner, &config.modified_dir, &config.tool_name)
        .with_version_rewrite(config.rewrite_version);
    let apt = PackageManager::new(runner, config.elevation());
    let ledger = Ledger::new(&config.marker_dir, runner).with_elevation(config.elevation());

    let mut installed = Vec::new();
    for artifact in &artifacts {
        let package = &artifact.deb.name;
        let default_yes = default_answer(package);

        let wanted = if options.assume_yes {
            default_yes
        } else {
            ask_yes_no(&format!("install {}?", package), default_yes)?
        };
        if !wanted {
            debug!("Skipping {}", package);
            continue;
        }

        install_artifact(jobs, &mutator, &apt, &ledger, config, info, artifact, options)
            .with_context(|| format!("Failed to install {}", artifact.file_name))?;
        installed.push(package.clone());
    }

    if installed.is_empty() {
        println!("Nothing installed");
    } else if options.dry_run {
        println!("Would install: {}", installed.join(" "));
    } else {
        println!("Installed: {}", installed.join(" "));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn install_artifact(
    jobs: &dyn JobPage,
    mutator: &PackageMutator,
    apt: &PackageManager,
    ledger: &Ledger,
    config: &Config,
    info: &PullRequestInfo,
    artifact: &Artifact,
    options: InstallOptions,
) -> Result<()> {
    let downloaded = jobs.download(artifact, &config.download_dir)?;

    let provenance = ProvenanceRecord::new(&info.detail, &info.job_url, artifact.url.as_str());
    let modified = mutator.mutate(&downloaded, &provenance)?;
    let debs = [modified];

    if options.dry_run {
        apt.simulate_install(&debs)?;
        info!("Simulated install of {}", artifact.deb.name);
        return Ok(());
    }

    apt.install(&debs)?;
    ledger.record(&artifact.deb.name)?;
    Ok(())
}
