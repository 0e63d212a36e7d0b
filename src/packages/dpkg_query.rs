// src/packages/dpkg_query.rs

//! Query installed dpkg packages from the system database
//!
//! This module asks `dpkg-query` for the status and rendered description of
//! an installed package and extracts the provenance block from it.

use crate::error::{Error, Result};
use crate::provenance::ProvenanceRecord;
use crate::runner::CommandRunner;
use tracing::{debug, warn};

/// Output format passed to `dpkg-query -f`
pub const DESCRIBE_FORMAT: &str = r"${db:Status-Status}\n${Description}\n";

/// Status and description of a package as dpkg sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledDescription {
    /// `db:Status-Status`, e.g. `installed` or `config-files`
    pub status: String,
    /// Rendered description, continuation lines still indented
    pub description: String,
}

impl InstalledDescription {
    pub fn is_installed(&self) -> bool {
        self.status == "installed"
    }
}

/// Ask dpkg for a package's status and description
///
/// Returns `Ok(None)` when dpkg does not know the package at all.
pub fn describe_installed(runner: &dyn CommandRunner, name: &str) -> Result<Option<InstalledDescription>> {
    debug!("Querying package description: {}", name);

    let output = runner
        .run("dpkg-query", &["-f", DESCRIBE_FORMAT, "--show", name])
        .map_err(|e| Error::MetadataQuery {
            package: name.to_string(),
            reason: e.to_string(),
        })?;

    if output.code == Some(1) {
        debug!("Package {} is unknown to dpkg", name);
        return Ok(None);
    }
    if !output.success() {
        return Err(Error::MetadataQuery {
            package: name.to_string(),
            reason: output.failure_reason(),
        });
    }

    let stdout = output.stdout_str();
    let (status, description) = stdout.split_once('\n').unwrap_or((stdout.as_ref(), ""));

    Ok(Some(InstalledDescription {
        status: status.trim().to_string(),
        description: description.to_string(),
    }))
}

/// Provenance embedded in an installed package, if any
///
/// Query failures and undecodable blocks are logged and reported as "no
/// provenance": unrelated packages routinely have neither.
pub fn installed_provenance(runner: &dyn CommandRunner, name: &str) -> Option<ProvenanceRecord> {
    let described = match describe_installed(runner, name) {
        Ok(Some(described)) => described,
        Ok(None) => return None,
        Err(e) => {
            warn!("{}", e);
            return None;
        }
    };

    if !described.is_installed() {
        debug!("Package {} has status {}", name, described.status);
        return None;
    }

    match ProvenanceRecord::extract(&described.description) {
        Ok(record) => record,
        Err(e) => {
            warn!("Package {}: {}", name, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, ScriptedRunner};

    fn describe_args(name: &str) -> [&str; 4] {
        ["-f", DESCRIBE_FORMAT, "--show", name]
    }

    const RENDERED: &str = "installed\nFoo library\n A library.\n The following information is added by pr-test\n =begin\n PR_URL=https://github.com/linuxdeepin/foo/pull/3\n PR_REPO=foo\n PR_NUM=3\n PR_USER=bob\n PR_TITLE=feat: things\n PR_STATE=open\n CI_URL=https://ci/job/9/\n DEB_URL=https://ci/job/9/foo_1.0_amd64.deb\n DEB_MODIFY_TIME=2024-01-02T03:04:05+08:00\n =end\n";

    #[test]
    fn test_describe_installed() {
        let runner = ScriptedRunner::new();
        runner.on("dpkg-query", &describe_args("foo"), CommandOutput::ok(RENDERED));

        let described = describe_installed(&runner, "foo").unwrap().unwrap();
        assert!(described.is_installed());
        assert!(described.description.starts_with("Foo library\n"));
    }

    #[test]
    fn test_installed_provenance_found() {
        let runner = ScriptedRunner::new();
        runner.on("dpkg-query", &describe_args("foo"), CommandOutput::ok(RENDERED));

        let record = installed_provenance(&runner, "foo").unwrap();
        assert_eq!(record.pr_repo, "foo");
        assert_eq!(record.pr_num, 3);
        assert_eq!(record.ci_url, "https://ci/job/9/");
    }

    #[test]
    fn test_unknown_package_has_no_provenance() {
        let runner = ScriptedRunner::new();
        runner.on(
            "dpkg-query",
            &describe_args("gone"),
            CommandOutput::failed(1, "dpkg-query: no packages found matching gone"),
        );

        assert!(describe_installed(&runner, "gone").unwrap().is_none());
        assert!(installed_provenance(&runner, "gone").is_none());
    }

    #[test]
    fn test_removed_package_with_config_files() {
        let runner = ScriptedRunner::new();
        runner.on(
            "dpkg-query",
            &describe_args("foo"),
            CommandOutput::ok(RENDERED.replacen("installed", "config-files", 1)),
        );
        assert!(installed_provenance(&runner, "foo").is_none());
    }

    #[test]
    fn test_query_failure_is_not_propagated() {
        let runner = ScriptedRunner::new();
        runner.on("dpkg-query", &describe_args("foo"), CommandOutput::failed(2, "database locked"));

        assert!(matches!(
            describe_installed(&runner, "foo"),
            Err(Error::MetadataQuery { .. })
        ));
        assert!(installed_provenance(&runner, "foo").is_none());
    }
}
