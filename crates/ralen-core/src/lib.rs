//! Core library of ralen, a version manager for language runtimes published
//! as GitHub releases.
//!
//! # Architecture Overview
//!
//! - **Catalog**: the languages ralen knows how to install and where their releases live
//! - **Installation**: release lookup, download, unpacking into `versions/<language>/<tag>/`
//!   and a post-install smoke test
//! - **Projects**: `*.ralenproj` descriptors, scaffolding and running an entry file with
//!   the pinned runtime
//! - **Packages**: auxiliary files kept under `modules/`
//! - **Configuration**: `config.json` in the ralen home directory and PATH setup

pub mod catalog;
pub mod config;
pub mod errors;
pub mod installation;
pub mod packages;
pub mod path_config;
pub mod project;

pub use catalog::{LanguageCatalog, LanguageDefinition};
pub use config::*;
pub use errors::{RalenError, RalenResult};
pub use installation::{InstallationOrchestrator, RuntimeManager, RuntimeRegistry, VersionSpec};
pub use packages::{PackageOutcome, PackageStore};
pub use path_config::PathConfigurator;
pub use project::{ProjectDescriptor, ProjectRunner};

#[cfg(test)]
pub mod test_utils;
