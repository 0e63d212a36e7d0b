// src/packages/archive.rs

//! Debian package archive members
//!
//! A `.deb` is an `ar` archive with (in order) `debian-binary`, a
//! `control.tar[.gz|.xz]` member and a `data.tar.*` member. This module lists
//! members, locates the control member and its codec, and swaps a member's
//! contents while keeping everything else about the archive intact.

use crate::compression::CompressionFormat;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

/// Prefix shared by every control member name
pub const CONTROL_MEMBER_PREFIX: &str = "control.tar";

/// The control member of a package and how its tarball is compressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMember {
    pub name: String,
    pub compression: CompressionFormat,
}

/// Components of a `name_version_arch.deb` filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebFilename {
    pub name: String,
    pub version: String,
    pub arch: String,
}

impl DebFilename {
    /// Split a package basename into name, version and architecture
    pub fn parse(filename: &str) -> Result<Self> {
        let stem = filename.strip_suffix(".deb").unwrap_or(filename);
        let fields: Vec<&str> = stem.splitn(3, '_').collect();
        match fields.as_slice() {
            [name, version, arch] if !name.is_empty() && !version.is_empty() && !arch.is_empty() => {
                Ok(Self {
                    name: name.to_string(),
                    version: version.to_string(),
                    arch: arch.to_string(),
                })
            }
            _ => Err(Error::ArchiveRead {
                path: filename.into(),
                reason: "filename is not of the form name_version_arch.deb".to_string(),
            }),
        }
    }
}

fn open_archive(path: &Path) -> Result<ar::Archive<File>> {
    let file = File::open(path).map_err(|e| Error::ArchiveRead {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(ar::Archive::new(file))
}

fn member_name(header: &ar::Header) -> String {
    // GNU ar terminates short names with '/'
    let name = String::from_utf8_lossy(header.identifier());
    name.trim_end_matches('/').to_string()
}

/// List the members of a package archive in order
///
/// Fails with [`Error::ArchiveRead`] if the archive cannot be read or is empty.
pub fn list_members(path: &Path) -> Result<Vec<String>> {
    let mut archive = open_archive(path)?;
    let mut members = Vec::new();

    while let Some(entry) = archive.next_entry() {
        let entry = entry.map_err(|e| Error::ArchiveRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        members.push(member_name(entry.header()));
    }

    if members.is_empty() {
        return Err(Error::ArchiveRead {
            path: path.to_path_buf(),
            reason: "archive has no members".to_string(),
        });
    }

    debug!("Members of {}: {:?}", path.display(), members);
    Ok(members)
}

/// Find the first `control.tar*` member and resolve its codec
pub fn find_control_member(path: &Path, members: &[String]) -> Result<ControlMember> {
    let name = members
        .iter()
        .find(|m| m.starts_with(CONTROL_MEMBER_PREFIX))
        .ok_or_else(|| Error::ArchiveRead {
            path: path.to_path_buf(),
            reason: "no control.tar member found".to_string(),
        })?;

    let suffix = &name[CONTROL_MEMBER_PREFIX.len()..];
    let compression =
        CompressionFormat::from_suffix(suffix).ok_or_else(|| Error::UnknownCompression { member: name.clone() })?;

    Ok(ControlMember {
        name: name.clone(),
        compression,
    })
}

/// Read the full contents of a named member
pub fn read_member(path: &Path, name: &str) -> Result<Vec<u8>> {
    let mut archive = open_archive(path)?;

    while let Some(entry) = archive.next_entry() {
        let mut entry = entry.map_err(|e| Error::ArchiveRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if member_name(entry.header()) == name {
            let mut data = Vec::new();
            entry.read_to_end(&mut data).map_err(|e| Error::ArchiveRead {
                path: path.to_path_buf(),
                reason: format!("failed to read member {}: {}", name, e),
            })?;
            return Ok(data);
        }
    }

    Err(Error::ArchiveRead {
        path: path.to_path_buf(),
        reason: format!("member {} not found", name),
    })
}

/// Replace the contents of a named member, keeping member order and headers
///
/// The new archive is written next to the original and renamed over it, so
/// on failure the file at `path` is unchanged.
pub fn replace_member(path: &Path, name: &str, contents: &[u8]) -> Result<()> {
    let mut archive = open_archive(path)?;
    let mut buffer = Vec::new();
    let mut replaced = false;

    {
        let mut builder = ar::Builder::new(&mut buffer);

        while let Some(entry) = archive.next_entry() {
            let mut entry = entry.map_err(|e| Error::ArchiveRead {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            let member = member_name(entry.header());

            let data = if member == name {
                replaced = true;
                contents.to_vec()
            } else {
                let mut data = Vec::new();
                entry.read_to_end(&mut data)?;
                data
            };

            let original = entry.header();
            let mut header = ar::Header::new(member.into_bytes(), data.len() as u64);
            header.set_mtime(original.mtime());
            header.set_uid(original.uid());
            header.set_gid(original.gid());
            header.set_mode(original.mode());
            builder.append(&header, data.as_slice())?;
        }
    }

    if !replaced {
        return Err(Error::ArchiveRead {
            path: path.to_path_buf(),
            reason: format!("member {} not found", name),
        });
    }

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(&buffer)?;
    staged.flush()?;
    staged.persist(path).map_err(|e| Error::Io(e.error))?;

    debug!("Replaced member {} in {}", name, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_archive(dir: &TempDir, members: &[(&str, &str)]) -> std::path::PathBuf {
        let path = dir.path().join("test_1.0_all.deb");
        let file = File::create(&path).unwrap();
        let mut builder = ar::Builder::new(file);
        for (name, data) in members {
            let mut header = ar::Header::new(name.as_bytes().to_vec(), data.len() as u64);
            header.set_mode(0o100644);
            header.set_mtime(1_600_000_000);
            builder.append(&header, data.as_bytes()).unwrap();
        }
        path
    }

    #[test]
    fn test_list_members_in_order() {
        let dir = TempDir::new().unwrap();
        let path = write_archive(
            &dir,
            &[("debian-binary", "2.0\n"), ("control.tar.xz", "x"), ("data.tar.xz", "y")],
        );
        let members = list_members(&path).unwrap();
        assert_eq!(members, vec!["debian-binary", "control.tar.xz", "data.tar.xz"]);
    }

    #[test]
    fn test_list_members_empty_archive() {
        let dir = TempDir::new().unwrap();
        let path = write_archive(&dir, &[]);
        assert!(matches!(list_members(&path), Err(Error::ArchiveRead { .. })));
    }

    #[test]
    fn test_list_members_missing_file() {
        let err = list_members(Path::new("/nonexistent/pkg.deb")).unwrap_err();
        assert!(matches!(err, Error::ArchiveRead { .. }));
    }

    #[test]
    fn test_find_control_member_codecs() {
        let path = Path::new("pkg.deb");
        let members = |m: &str| vec!["debian-binary".to_string(), m.to_string(), "data.tar.gz".to_string()];

        let gz = find_control_member(path, &members("control.tar.gz")).unwrap();
        assert_eq!(gz.compression, CompressionFormat::Gzip);

        let xz = find_control_member(path, &members("control.tar.xz")).unwrap();
        assert_eq!(xz.compression, CompressionFormat::Xz);

        let plain = find_control_member(path, &members("control.tar")).unwrap();
        assert_eq!(plain.compression, CompressionFormat::None);
        assert_eq!(plain.name, "control.tar");
    }

    #[test]
    fn test_find_control_member_unknown_compression() {
        let members = vec!["debian-binary".to_string(), "control.tar.zst".to_string()];
        let err = find_control_member(Path::new("pkg.deb"), &members).unwrap_err();
        assert!(matches!(err, Error::UnknownCompression { member } if member == "control.tar.zst"));
    }

    #[test]
    fn test_find_control_member_missing() {
        let members = vec!["debian-binary".to_string(), "data.tar.gz".to_string()];
        let err = find_control_member(Path::new("pkg.deb"), &members).unwrap_err();
        assert!(matches!(err, Error::ArchiveRead { .. }));
    }

    #[test]
    fn test_replace_member_keeps_order_and_other_data() {
        let dir = TempDir::new().unwrap();
        let path = write_archive(
            &dir,
            &[("debian-binary", "2.0\n"), ("control.tar", "old"), ("data.tar", "payload")],
        );

        replace_member(&path, "control.tar", b"new contents").unwrap();

        assert_eq!(list_members(&path).unwrap(), vec!["debian-binary", "control.tar", "data.tar"]);
        assert_eq!(read_member(&path, "control.tar").unwrap(), b"new contents");
        assert_eq!(read_member(&path, "data.tar").unwrap(), b"payload");
        assert_eq!(read_member(&path, "debian-binary").unwrap(), b"2.0\n");
    }

    #[test]
    fn test_replace_missing_member_leaves_file() {
        let dir = TempDir::new().unwrap();
        let path = write_archive(&dir, &[("debian-binary", "2.0\n")]);
        let before = std::fs::read(&path).unwrap();

        assert!(replace_member(&path, "control.tar.gz", b"x").is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_deb_filename_parse() {
        let parsed = DebFilename::parse("dde-file-manager_5.2.0+r1_amd64.deb").unwrap();
        assert_eq!(parsed.name, "dde-file-manager");
        assert_eq!(parsed.version, "5.2.0+r1");
        assert_eq!(parsed.arch, "amd64");

        assert!(DebFilename::parse("broken.deb").is_err());
        assert!(DebFilename::parse("a_b.deb").is_err());
    }
}
