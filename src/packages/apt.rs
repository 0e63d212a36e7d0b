// src/packages/apt.rs

//! apt front end: install, reinstall and package index queries
//!
//! Install and reinstall run attached to the terminal and only their exit
//! status matters. Index queries (`apt-cache policy`) are captured and
//! parsed.

use crate::error::{Error, Result};
use crate::runner::{command_line, CommandRunner, Elevation};
use std::path::PathBuf;
use tracing::{debug, info};

/// Installed and candidate versions of a package from `apt-cache policy`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackagePolicy {
    pub installed: Option<String>,
    pub candidate: Option<String>,
}

impl PackagePolicy {
    /// Parse `apt-cache policy <pkg>` output
    pub fn parse(output: &str) -> Self {
        let mut policy = Self::default();

        let version = |value: &str| {
            let value = value.trim();
            (!value.is_empty() && value != "(none)").then(|| value.to_string())
        };

        for line in output.lines().map(str::trim) {
            if let Some(value) = line.strip_prefix("Installed:") {
                policy.installed = version(value);
            } else if let Some(value) = line.strip_prefix("Candidate:") {
                policy.candidate = version(value);
            }
        }

        policy
    }

    /// Version a mutated package should carry
    ///
    /// Not installed but available: the candidate. Otherwise the installed
    /// version. `None` when neither is known.
    pub fn replacement_version(&self) -> Option<String> {
        match (&self.installed, &self.candidate) {
            (None, Some(candidate)) => Some(candidate.clone()),
            (installed, _) => installed.clone(),
        }
    }
}

/// Wrapper around `apt`, `apt-get` and `apt-cache`
pub struct PackageManager<'a> {
    runner: &'a dyn CommandRunner,
    elevation: Elevation,
}

impl<'a> PackageManager<'a> {
    pub fn new(runner: &'a dyn CommandRunner, elevation: Elevation) -> Self {
        Self { runner, elevation }
    }

    fn run_elevated(&self, program: &str, args: &[&str]) -> Result<()> {
        let (program, args) = self.elevation.wrap(program, args);
        self.run_checked(program, &args)
    }

    fn run_checked(&self, program: &str, args: &[&str]) -> Result<()> {
        let line = command_line(program, args);
        info!("Running: {}", line);

        let reason = match self.runner.run_attached(program, args) {
            Ok(Some(0)) => return Ok(()),
            Ok(Some(code)) => format!("exit status {}", code),
            Ok(None) => "terminated by signal".to_string(),
            Err(e) => e.to_string(),
        };

        Err(Error::PackageManager { command: line, reason })
    }

    /// Install local package archives, allowing downgrades and reinstalls
    pub fn install(&self, debs: &[PathBuf]) -> Result<()> {
        let paths = local_paths(debs)?;
        let mut args = vec!["install", "-y", "--allow-downgrades", "--reinstall"];
        args.extend(paths.iter().map(String::as_str));
        self.run_elevated("apt", &args)
    }

    /// Check that local package archives would install, changing nothing
    pub fn simulate_install(&self, debs: &[PathBuf]) -> Result<()> {
        let paths = local_paths(debs)?;
        let mut args = vec!["install", "--simulate", "--allow-downgrades", "--reinstall"];
        args.extend(paths.iter().map(String::as_str));

        self.run_checked("apt-get", &args)
    }

    /// Reinstall packages by name from the configured repositories
    pub fn reinstall_fix_missing(&self, packages: &[String]) -> Result<()> {
        let mut args = vec!["install", "-y", "--reinstall", "--allow-downgrades", "--fix-missing"];
        args.extend(packages.iter().map(String::as_str));
        self.run_elevated("apt-get", &args)
    }

    /// Query installed and candidate versions of a package
    pub fn policy(&self, package: &str) -> Result<PackagePolicy> {
        let output = self
            .runner
            .run("apt-cache", &["policy", package])
            .map_err(|e| Error::MetadataQuery {
                package: package.to_string(),
                reason: e.to_string(),
            })?;

        if !output.success() {
            return Err(Error::MetadataQuery {
                package: package.to_string(),
                reason: output.failure_reason(),
            });
        }

        let policy = PackagePolicy::parse(&output.stdout_str());
        debug!("Policy for {}: {:?}", package, policy);
        Ok(policy)
    }
}

/// apt only treats arguments as files when they look like paths
fn local_paths(debs: &[PathBuf]) -> Result<Vec<String>> {
    debs.iter()
        .map(|p| -> Result<String> {
            let absolute = if p.is_absolute() {
                p.clone()
            } else {
                std::path::absolute(p)?
            };
            Ok(absolute.to_string_lossy().into_owned())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, ScriptedRunner};

    const POLICY_INSTALLED: &str = "\
dde-dock:
  Installed: 5.5.1-1
  Candidate: 5.5.2-1
  Version table:
     5.5.2-1 500
        500 http://packages.deepin.com/deepin apricot/main amd64 Packages
 *** 5.5.1-1 100
        100 /var/lib/dpkg/status
";

    const POLICY_NOT_INSTALLED: &str = "\
dde-dock:
  Installed: (none)
  Candidate: 5.5.2-1
";

    #[test]
    fn test_policy_parse() {
        let policy = PackagePolicy::parse(POLICY_INSTALLED);
        assert_eq!(policy.installed.as_deref(), Some("5.5.1-1"));
        assert_eq!(policy.candidate.as_deref(), Some("5.5.2-1"));
        assert_eq!(policy.replacement_version().as_deref(), Some("5.5.1-1"));
    }

    #[test]
    fn test_replacement_uses_candidate_when_not_installed() {
        let policy = PackagePolicy::parse(POLICY_NOT_INSTALLED);
        assert_eq!(policy.installed, None);
        assert_eq!(policy.replacement_version().as_deref(), Some("5.5.2-1"));
    }

    #[test]
    fn test_replacement_none_when_unknown() {
        let policy = PackagePolicy::parse("");
        assert_eq!(policy.replacement_version(), None);
        let policy = PackagePolicy::parse("x:\n  Installed: (none)\n  Candidate: (none)\n");
        assert_eq!(policy.replacement_version(), None);
    }

    #[test]
    fn test_reinstall_failure_is_package_manager_error() {
        let runner = ScriptedRunner::new();
        runner.on(
            "apt-get",
            &["install", "-y", "--reinstall", "--allow-downgrades", "--fix-missing", "a"],
            CommandOutput::failed(100, ""),
        );
        let apt = PackageManager::new(&runner, Elevation::none());
        let err = apt.reinstall_fix_missing(&["a".to_string()]).unwrap_err();
        assert!(matches!(err, Error::PackageManager { .. }));
    }

    #[test]
    fn test_install_elevated() {
        let runner = ScriptedRunner::new();
        runner.on(
            "sudo",
            &["apt", "install", "-y", "--allow-downgrades", "--reinstall", "/tmp/foo_1.0_amd64.deb"],
            CommandOutput::ok(""),
        );
        let apt = PackageManager::new(&runner, Elevation::new(vec!["sudo".to_string()]));
        apt.install(&[PathBuf::from("/tmp/foo_1.0_amd64.deb")]).unwrap();
        assert!(runner.was_called("sudo apt install"));
    }
}
