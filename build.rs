// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Mirrors `src/cli/mod.rs`; build scripts cannot use the crate itself
fn build_cli() -> Command {
    Command::new("pr-test")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Install CI-built packages of a pull request and restore them later")
        .arg(
            Arg::new("pull_request")
                .value_name("PULL_REQUEST")
                .conflicts_with_all(["status", "restore"])
                .help("Pull request: NUM (repository from git remotes), REPO#NUM, or its GitHub URL"),
        )
        .arg(
            Arg::new("status")
                .long("status")
                .action(ArgAction::SetTrue)
                .conflicts_with("restore")
                .help("Show installed test packages grouped by CI job"),
        )
        .arg(
            Arg::new("restore")
                .long("restore")
                .value_name("PATTERN")
                .help("Restore repository versions: `all`, a repository name, or a user login"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Configuration file (default: $XDG_CONFIG_HOME/pr-test/config.toml)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .arg(
            Arg::new("yes")
                .short('y')
                .long("yes")
                .action(ArgAction::SetTrue)
                .help("Accept the default answer of every prompt"),
        )
        .arg(
            Arg::new("dry_run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Check that packages would install without changing the system"),
        )
}

/// Render the man page into `man/` next to the manifest
fn write_man_page(manifest_dir: &Path) -> io::Result<PathBuf> {
    let target = manifest_dir.join("man").join("pr-test.1");
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut page = Vec::new();
    Man::new(build_cli()).render(&mut page)?;
    fs::write(&target, page)?;
    Ok(target)
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/cli/mod.rs");

    let Some(manifest_dir) = env::var_os("CARGO_MANIFEST_DIR") else {
        println!("cargo:warning=CARGO_MANIFEST_DIR unset, skipping man page");
        return;
    };

    if let Err(e) = write_man_page(Path::new(&manifest_dir)) {
        println!("cargo:warning=Man page not generated: {}", e);
    }
}
