// src/packages/mod.rs

//! Debian package handling
//!
//! Archive member access, control metadata editing, the package mutator, and
//! thin wrappers over `dpkg-query` and apt.

pub mod apt;
pub mod archive;
pub mod control;
pub mod dpkg_query;
pub mod mutator;

pub use apt::{PackageManager, PackagePolicy};
pub use archive::{ControlMember, DebFilename};
pub use control::{ControlField, ControlParagraph};
pub use mutator::PackageMutator;
