// src/ledger.rs

//! Install ledger: which packages this tool installed, and from where
//!
//! The ledger is a directory holding one empty marker file per installed
//! package. Presence of a marker is the only persisted state; everything
//! else (pull request, job, user) is read back from the provenance block
//! embedded in the installed package's description.
//!
//! There is no locking. Two invocations touching the same marker directory
//! at once must be serialized by the operator.

use crate::error::{Error, Result};
use crate::packages::dpkg_query;
use crate::provenance::ProvenanceRecord;
use crate::runner::{command_line, CommandRunner, Elevation};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Permissions of a freshly created marker directory
const MARKER_DIR_MODE: u32 = 0o755;

/// Packages installed from one CI job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEntry {
    /// Provenance of the first package seen for this job
    pub provenance: ProvenanceRecord,
    /// Package names, sorted
    pub packages: Vec<String>,
}

impl JobEntry {
    /// Space separated package list
    pub fn pkgs(&self) -> String {
        self.packages.join(" ")
    }
}

/// Ledger contents grouped by originating job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerReport {
    /// Keyed by `CI_URL`
    pub jobs: BTreeMap<String, JobEntry>,
    /// Marked packages whose installed metadata carries no provenance
    pub invalid: Vec<String>,
}

impl LedgerReport {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty() && self.invalid.is_empty()
    }

    /// Add a package to the entry for its job
    pub fn insert(&mut self, package: &str, provenance: ProvenanceRecord) {
        let entry = self
            .jobs
            .entry(provenance.ci_url.clone())
            .or_insert_with(|| JobEntry {
                provenance,
                packages: Vec::new(),
            });
        if let Err(pos) = entry.packages.binary_search_by(|p| p.as_str().cmp(package)) {
            entry.packages.insert(pos, package.to_string());
        }
    }
}

/// Marker-directory backed record of installed packages
pub struct Ledger<'a> {
    dir: PathBuf,
    runner: &'a dyn CommandRunner,
    elevation: Elevation,
}

impl<'a> Ledger<'a> {
    pub fn new(dir: impl Into<PathBuf>, runner: &'a dyn CommandRunner) -> Self {
        Self {
            dir: dir.into(),
            runner,
            elevation: Elevation::none(),
        }
    }

    /// Retry writes through `elevation` when permission is denied
    pub fn with_elevation(mut self, elevation: Elevation) -> Self {
        self.elevation = elevation;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn marker_path(&self, package: &str) -> PathBuf {
        self.dir.join(package)
    }

    fn check_name(package: &str) -> Result<()> {
        if package.is_empty() || package.contains('/') || package == "." || package == ".." {
            return Err(Error::Ledger {
                path: PathBuf::from(package),
                source: io::Error::new(io::ErrorKind::InvalidInput, "invalid package name"),
            });
        }
        Ok(())
    }

    /// Run a file operation, falling back to the elevated command on EPERM/EACCES
    fn write_op(&self, path: &Path, op: impl FnOnce() -> io::Result<()>, program: &str, args: &[&str]) -> Result<()> {
        match op() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied && self.elevation.is_enabled() => {
                let (program, args) = self.elevation.wrap(program, args);
                debug!("Permission denied on {}, retrying with {}", path.display(), command_line(program, &args));
                // Attached so sudo can ask for a password
                match self.runner.run_attached(program, &args)? {
                    Some(0) => Ok(()),
                    code => Err(Error::Ledger {
                        path: path.to_path_buf(),
                        source: io::Error::other(format!("`{}` failed with {:?}", command_line(program, &args), code)),
                    }),
                }
            }
            Err(source) => Err(Error::Ledger {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn ensure_dir(&self) -> Result<()> {
        if self.dir.is_dir() {
            return Ok(());
        }

        let dir = self.dir.to_string_lossy();
        let mode = format!("{:o}", MARKER_DIR_MODE);
        self.write_op(
            &self.dir,
            || {
                fs::create_dir_all(&self.dir)?;
                fs::set_permissions(&self.dir, fs::Permissions::from_mode(MARKER_DIR_MODE))
            },
            "mkdir",
            &["-p", "-m", &mode, &dir],
        )
    }

    /// Record that `package` was installed by this tool
    ///
    /// Recording an already recorded package does nothing.
    pub fn record(&self, package: &str) -> Result<()> {
        Self::check_name(package)?;
        self.ensure_dir()?;

        let marker = self.marker_path(package);
        if marker.exists() {
            debug!("Marker for {} already present", package);
            return Ok(());
        }

        let marker_str = marker.to_string_lossy();
        self.write_op(
            &marker,
            || fs::OpenOptions::new().create(true).append(true).open(&marker).map(|_| ()),
            "touch",
            &[&marker_str],
        )?;

        info!("Recorded install of {}", package);
        Ok(())
    }

    /// Forget `package`; a missing marker is not an error
    pub fn erase(&self, package: &str) -> Result<()> {
        Self::check_name(package)?;

        let marker = self.marker_path(package);
        if !marker.exists() {
            debug!("No marker for {}", package);
            return Ok(());
        }

        let marker_str = marker.to_string_lossy();
        self.write_op(&marker, || fs::remove_file(&marker), "rm", &["-f", &marker_str])?;

        info!("Erased marker for {}", package);
        Ok(())
    }

    /// Names of all recorded packages, sorted
    pub fn packages(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(Error::Ledger {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut packages = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::Ledger {
                path: self.dir.clone(),
                source,
            })?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                packages.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        packages.sort();
        Ok(packages)
    }

    /// Provenance of an installed package, `None` if it carries none
    pub fn provenance(&self, package: &str) -> Option<ProvenanceRecord> {
        dpkg_query::installed_provenance(self.runner, package)
    }

    /// Group recorded packages by the CI job that built them
    pub fn list_grouped_by_job(&self) -> Result<LedgerReport> {
        let mut report = LedgerReport::default();

        for package in self.packages()? {
            match self.provenance(&package) {
                Some(provenance) => report.insert(&package, provenance),
                None => {
                    debug!("{} is marked but carries no provenance", package);
                    report.invalid.push(package);
                }
            }
        }

        Ok(report)
    }
}

impl fmt::Display for LedgerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (job_url, entry) in &self.jobs {
            let p = &entry.provenance;
            writeln!(f, "Repo: {}", p.pr_repo)?;
            writeln!(f, "Pull request: #{}", p.pr_num)?;
            writeln!(f, "Title: {}", p.pr_title)?;
            writeln!(f, "State: {}", p.pr_state)?;
            writeln!(f, "User: {}", p.pr_user)?;
            writeln!(f, "PR url: {}", p.pr_url)?;
            writeln!(f, "Package: {}", entry.pkgs())?;
            writeln!(f, "Job url: {}", job_url)?;
            writeln!(f)?;
        }

        if !self.invalid.is_empty() {
            writeln!(f, "Marked packages without provenance: {}", self.invalid.join(" "))?;
        }
        Ok(())
    }
}

/// Render a ledger report for the terminal
pub fn render_status(report: &LedgerReport) -> String {
    report.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, ScriptedRunner};
    use chrono::DateTime;
    use tempfile::TempDir;

    fn record(repo: &str, job: &str) -> ProvenanceRecord {
        ProvenanceRecord {
            depends: None,
            pr_url: format!("https://github.com/linuxdeepin/{}/pull/1", repo),
            pr_repo: repo.to_string(),
            pr_num: 1,
            pr_user: "alice".to_string(),
            pr_title: "t".to_string(),
            pr_state: "open".to_string(),
            ci_url: job.to_string(),
            deb_url: format!("{}artifact.deb", job),
            deb_modify_time: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
        }
    }

    #[test]
    fn test_record_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new();
        let ledger = Ledger::new(dir.path().join("markers"), &runner);

        ledger.record("foo").unwrap();
        ledger.record("foo").unwrap();

        assert_eq!(ledger.packages().unwrap(), vec!["foo"]);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_marker_dir_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new();
        let ledger = Ledger::new(dir.path().join("markers"), &runner);
        ledger.record("foo").unwrap();

        let mode = fs::metadata(ledger.dir()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }

    /// Read-only marker directory; `None` when running as root, which ignores the mode
    fn read_only_markers(dir: &TempDir) -> Option<PathBuf> {
        let markers = dir.path().join("markers");
        fs::create_dir(&markers).unwrap();
        fs::write(markers.join("stale"), "").unwrap();
        fs::set_permissions(&markers, fs::Permissions::from_mode(0o555)).unwrap();

        if fs::write(markers.join("access-check"), "").is_ok() {
            return None;
        }
        Some(markers)
    }

    fn restore_writable(markers: &Path) {
        fs::set_permissions(markers, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_denied_record_retries_elevated() {
        let dir = TempDir::new().unwrap();
        let Some(markers) = read_only_markers(&dir) else {
            return;
        };
        let runner = ScriptedRunner::new();
        let ledger = Ledger::new(&markers, &runner).with_elevation(Elevation::new(vec!["sudo".to_string()]));

        let foo = markers.join("foo").to_string_lossy().into_owned();
        runner.on("sudo", &["touch", &foo], CommandOutput::ok(""));
        ledger.record("foo").unwrap();
        assert!(runner.was_called(&format!("sudo touch {}", foo)));

        let bar = markers.join("bar").to_string_lossy().into_owned();
        runner.on("sudo", &["touch", &bar], CommandOutput::failed(1, "sudo: a password is required"));
        let err = ledger.record("bar").unwrap_err();
        assert!(matches!(err, Error::Ledger { ref path, .. } if path.ends_with("bar")), "{err}");

        restore_writable(&markers);
    }

    #[test]
    fn test_denied_erase_retries_elevated() {
        let dir = TempDir::new().unwrap();
        let Some(markers) = read_only_markers(&dir) else {
            return;
        };
        let runner = ScriptedRunner::new();
        let ledger = Ledger::new(&markers, &runner).with_elevation(Elevation::new(vec!["sudo".to_string()]));

        let stale = markers.join("stale").to_string_lossy().into_owned();
        runner.on("sudo", &["rm", "-f", &stale], CommandOutput::ok(""));
        ledger.erase("stale").unwrap();
        assert!(runner.was_called(&format!("sudo rm -f {}", stale)));

        restore_writable(&markers);
    }

    #[test]
    fn test_denied_without_elevation_is_ledger_error() {
        let dir = TempDir::new().unwrap();
        let Some(markers) = read_only_markers(&dir) else {
            return;
        };
        let runner = ScriptedRunner::new();
        let ledger = Ledger::new(&markers, &runner);

        let err = ledger.record("foo").unwrap_err();
        assert!(matches!(err, Error::Ledger { .. }), "{err}");
        assert!(runner.calls().is_empty());

        restore_writable(&markers);
    }

    #[test]
    fn test_erase_missing_marker_is_ok() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new();
        let ledger = Ledger::new(dir.path(), &runner);

        ledger.erase("never-recorded").unwrap();
        ledger.record("foo").unwrap();
        ledger.erase("foo").unwrap();
        assert!(ledger.packages().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_names_rejected() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new();
        let ledger = Ledger::new(dir.path(), &runner);

        assert!(ledger.record("../etc/passwd").is_err());
        assert!(ledger.record("").is_err());
        assert!(ledger.erase("..").is_err());
    }

    #[test]
    fn test_missing_dir_lists_nothing() {
        let runner = ScriptedRunner::new();
        let ledger = Ledger::new("/nonexistent/pr-test-markers", &runner);
        assert!(ledger.list_grouped_by_job().unwrap().is_empty());
    }

    #[test]
    fn test_report_insert_groups_by_job() {
        let mut report = LedgerReport::default();
        report.insert("b", record("app", "https://ci/job/1/"));
        report.insert("a", record("app", "https://ci/job/1/"));
        report.insert("c", record("lib", "https://ci/job/2/"));
        report.insert("a", record("app", "https://ci/job/1/"));

        assert_eq!(report.jobs.len(), 2);
        assert_eq!(report.jobs["https://ci/job/1/"].pkgs(), "a b");
        assert_eq!(report.jobs["https://ci/job/2/"].pkgs(), "c");
    }

    #[test]
    fn test_render_status() {
        let mut report = LedgerReport::default();
        report.insert("foo", record("x", "https://ci/job/1/"));
        report.invalid.push("stale".to_string());

        let text = render_status(&report);
        assert!(text.contains("Repo: x\n"));
        assert!(text.contains("Package: foo\n"));
        assert!(text.contains("User: alice\n"));
        assert!(text.contains("Job url: https://ci/job/1/\n"));
        assert!(text.contains("Marked packages without provenance: stale"));
    }
}
