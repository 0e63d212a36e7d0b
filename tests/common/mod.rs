// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use pr_test::compression::{self, CompressionFormat};
use pr_test::packages::dpkg_query::DESCRIBE_FORMAT;
use pr_test::packages::{archive, ControlParagraph};
use pr_test::{CommandOutput, PullRequestDetail, PullRequestId, ScriptedRunner};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Control file of the `foo` fixture package
pub const FOO_CONTROL: &str = "\
Package: foo
Version: 1.0
Architecture: amd64
Maintainer: Deepin Packages Builder <packages@deepin.com>
Depends: libfoo1 (= 1.0), libc6 (>= 2.28)
Description: Foo utility
 Foo does things.
 .
 It does them well.
";

pub fn pull_request(repo: &str, num: u64, user: &str) -> PullRequestDetail {
    PullRequestDetail {
        id: PullRequestId::new(repo, num),
        url: format!("https://github.com/linuxdeepin/{}/pull/{}", repo, num),
        user: user.to_string(),
        title: "t".to_string(),
        state: "open".to_string(),
    }
}

fn tarball(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_path(path).unwrap();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_700_000_000);
        header.set_cksum();
        builder.append(&header, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

/// Write an ar archive with the given members
pub fn write_ar(path: &Path, members: &[(&str, Vec<u8>)]) {
    let mut builder = ar::Builder::new(File::create(path).unwrap());
    for (name, data) in members {
        let header = ar::Header::new(name.as_bytes().to_vec(), data.len() as u64);
        builder.append(&header, data.as_slice()).unwrap();
    }
}

/// Build `dir/<name>_<version>_amd64.deb` carrying `control`
pub fn build_deb_with(dir: &Path, file_name: &str, control: &str, format: CompressionFormat) -> PathBuf {
    let control_tar = tarball(&[
        ("./control", control.as_bytes()),
        ("./md5sums", &b"d41d8cd98f00b204e9800998ecf8427e  usr/share/doc/foo/copyright\n"[..]),
    ]);
    let data_tar = tarball(&[("./usr/share/doc/foo/copyright", &b""[..])]);

    let control_member = format!("control.tar{}", format.suffix());
    let path = dir.join(file_name);
    write_ar(
        &path,
        &[
            ("debian-binary", b"2.0\n".to_vec()),
            (control_member.as_str(), compression::compress(&control_tar, format).unwrap()),
            ("data.tar.gz", compression::compress(&data_tar, CompressionFormat::Gzip).unwrap()),
        ],
    );
    path
}

pub fn build_foo_deb(dir: &Path, format: CompressionFormat) -> PathBuf {
    build_deb_with(dir, "foo_1.0_amd64.deb", FOO_CONTROL, format)
}

/// Read one file of the control tarball back out of a package archive
pub fn read_control_file(deb: &Path, name: &str) -> Vec<u8> {
    let members = archive::list_members(deb).unwrap();
    let member = archive::find_control_member(deb, &members).unwrap();
    let packed = archive::read_member(deb, &member.name).unwrap();
    let unpacked = compression::decompress(&packed, member.compression).unwrap();

    let mut tarball = tar::Archive::new(unpacked.as_slice());
    for entry in tarball.entries().unwrap() {
        let mut entry = entry.unwrap();
        let path = entry.path().unwrap().to_string_lossy().into_owned();
        if path.trim_start_matches("./") == name {
            let mut data = Vec::new();
            std::io::Read::read_to_end(&mut entry, &mut data).unwrap();
            return data;
        }
    }
    panic!("no {} in {}", name, deb.display());
}

/// Read the `control` file back out of a package archive
pub fn read_control(deb: &Path) -> ControlParagraph {
    let text = String::from_utf8(read_control_file(deb, "control")).unwrap();
    ControlParagraph::parse(&text).unwrap()
}

/// What `dpkg-query -f '${db:Status-Status}\n${Description}\n'` prints
pub fn dpkg_rendering(status: &str, paragraph: &ControlParagraph) -> String {
    let description = paragraph.field_str("Description").unwrap_or("");
    let mut lines = description.lines();
    let mut out = format!("{}\n{}\n", status, lines.next().unwrap_or(""));
    for line in lines {
        out.push(' ');
        out.push_str(line);
        out.push('\n');
    }
    out
}

pub fn describe_args(package: &str) -> [&str; 4] {
    ["-f", DESCRIBE_FORMAT, "--show", package]
}

/// Script `dpkg-query` to report `package` as installed with `paragraph`
pub fn script_installed(runner: &ScriptedRunner, package: &str, paragraph: &ControlParagraph) {
    runner.on(
        "dpkg-query",
        &describe_args(package),
        CommandOutput::ok(dpkg_rendering("installed", paragraph)),
    );
}

/// Script `dpkg-query` to report `package` as installed without provenance
pub fn script_plain(runner: &ScriptedRunner, package: &str) {
    runner.on(
        "dpkg-query",
        &describe_args(package),
        CommandOutput::ok(format!("installed\n{} from the archive\n Nothing special.\n", package)),
    );
}

/// Script `dpkg-query` to report `package` as unknown
pub fn script_missing(runner: &ScriptedRunner, package: &str) {
    runner.on(
        "dpkg-query",
        &describe_args(package),
        CommandOutput::failed(1, format!("dpkg-query: no packages found matching {}", package)),
    );
}
