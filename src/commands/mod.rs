// src/commands/mod.rs
//! Command handlers for the pr-test CLI

mod install;
mod prompt;
mod restore;
mod status;

pub use install::{cmd_install, InstallOptions};
pub use restore::cmd_restore;
pub use status::cmd_status;
