// src/packages/mutator.rs

//! Rewrite a package's control metadata
//!
//! The mutator copies a `.deb` into its output directory and extracts the
//! control member into a scratch directory. The member is decoded straight
//! from that file, `control` is edited in place next to it, and the rebuilt
//! member is written back into the copy. The source archive is never
//! modified.

use super::apt::PackageManager;
use super::archive;
use super::control::{self, ControlParagraph};
use crate::compression;
use crate::error::{Error, Result};
use crate::provenance::ProvenanceRecord;
use crate::runner::{CommandRunner, Elevation};
use std::ffi::OsStr;
use std::fs;
use std::io::Read;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One entry of the nested control tarball
struct TarMember {
    header: tar::Header,
    path: Vec<u8>,
    data: Vec<u8>,
}

impl TarMember {
    fn is_control_file(&self) -> bool {
        let path = self.path.strip_prefix(b"./").unwrap_or(&self.path);
        path == b"control"
    }
}

fn read_tarball<R: Read>(reader: R) -> Result<Vec<TarMember>> {
    let mut tarball = tar::Archive::new(reader);
    let mut members = Vec::new();

    for entry in tarball.entries()? {
        let mut entry = entry?;
        let header = entry.header().clone();
        let path = entry.path_bytes().into_owned();
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        members.push(TarMember { header, path, data });
    }

    Ok(members)
}

fn write_tarball(members: &[TarMember]) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());

    for member in members {
        let mut header = member.header.clone();
        header.set_size(member.data.len() as u64);

        if header.path_bytes().as_ref() == member.path.as_slice() {
            header.set_cksum();
            builder.append(&header, member.data.as_slice())?;
        } else {
            // Name did not fit the header; let tar emit a long-name record
            let path = Path::new(OsStr::from_bytes(&member.path));
            builder.append_data(&mut header, path, member.data.as_slice())?;
        }
    }

    Ok(builder.into_inner()?)
}

/// Embeds provenance into package archives
pub struct PackageMutator<'a> {
    runner: &'a dyn CommandRunner,
    output_dir: PathBuf,
    tool_name: String,
    rewrite_version: bool,
}

impl<'a> PackageMutator<'a> {
    /// Create a mutator writing modified archives into `output_dir`
    pub fn new(runner: &'a dyn CommandRunner, output_dir: impl Into<PathBuf>, tool_name: impl Into<String>) -> Self {
        Self {
            runner,
            output_dir: output_dir.into(),
            tool_name: tool_name.into(),
            rewrite_version: true,
        }
    }

    /// Enable or disable version rewriting from the package index
    pub fn with_version_rewrite(mut self, enabled: bool) -> Self {
        self.rewrite_version = enabled;
        self
    }

    /// Produce a copy of `archive` carrying `provenance`
    ///
    /// Returns the path of the modified copy inside the output directory.
    pub fn mutate(&self, archive: &Path, provenance: &ProvenanceRecord) -> Result<PathBuf> {
        let file_name = archive.file_name().ok_or_else(|| Error::ArchiveRead {
            path: archive.to_path_buf(),
            reason: "path has no file name".to_string(),
        })?;

        fs::create_dir_all(&self.output_dir)?;
        let working = self.output_dir.join(file_name);
        let source = fs::canonicalize(archive).map_err(|e| Error::ArchiveRead {
            path: archive.to_path_buf(),
            reason: e.to_string(),
        })?;
        if source == fs::canonicalize(&self.output_dir)?.join(file_name) {
            return Err(Error::ArchiveRead {
                path: archive.to_path_buf(),
                reason: "output directory must differ from the source directory".to_string(),
            });
        }

        fs::copy(archive, &working)?;
        info!("Modifying {} -> {}", archive.display(), working.display());

        if let Err(e) = self.rewrite_control(&working, provenance) {
            // Leave no partial copy behind
            let _ = fs::remove_file(&working);
            return Err(e);
        }

        Ok(working)
    }

    fn rewrite_control(&self, working: &Path, provenance: &ProvenanceRecord) -> Result<()> {
        let members = archive::list_members(working)?;
        let control_member = archive::find_control_member(working, &members)?;
        debug!("Control member {} ({})", control_member.name, control_member.compression);

        // Dropped (and removed) on every return path below
        let scratch = tempfile::Builder::new().prefix("pr-test-mod").tempdir()?;
        debug!("Scratch directory: {}", scratch.path().display());

        let member_path = scratch.path().join(&control_member.name);
        fs::write(&member_path, archive::read_member(working, &control_member.name)?)?;

        let mut entries = read_tarball(compression::decoder(
            fs::File::open(&member_path)?,
            control_member.compression,
        ))?;
        let index = entries
            .iter()
            .position(TarMember::is_control_file)
            .ok_or_else(|| Error::MalformedControl(format!("{} has no control file", control_member.name)))?;

        let control_path = scratch.path().join("control");
        fs::write(&control_path, &entries[index].data)?;
        self.edit_control(&control_path, provenance)?;
        entries[index].data = fs::read(&control_path)?;

        let packed = compression::compress(&write_tarball(&entries)?, control_member.compression)?;
        archive::replace_member(working, &control_member.name, &packed)
    }

    fn edit_control(&self, path: &Path, provenance: &ProvenanceRecord) -> Result<()> {
        let paragraph = ControlParagraph::from_file(path)?;

        let new_version = match paragraph.field_str("Package") {
            Some(package) if self.rewrite_version => self.replacement_version(package),
            _ => None,
        };

        let mutated = control::mutate(paragraph, provenance, new_version.as_deref(), &self.tool_name);
        mutated.write_to_file(path)
    }

    /// Resolve the version to give the package; failures are not fatal
    fn replacement_version(&self, package: &str) -> Option<String> {
        let apt = PackageManager::new(self.runner, Elevation::none());
        match apt.policy(package) {
            Ok(policy) => {
                let version = policy.replacement_version();
                if version.is_none() {
                    info!("No installed or candidate version of {}, keeping its version", package);
                }
                version
            }
            Err(e) => {
                warn!("{}, keeping package version", e);
                None
            }
        }
    }
}
