//! Project descriptors (`*.ralenproj`), scaffolding and the project runner

pub mod descriptor;
pub mod runner;
pub mod scaffold;

pub use descriptor::{discover_projects, ProjectDescriptor, PROJECT_EXTENSION};
pub use runner::{execute_runtime, ProjectChooser, ProjectRunner, TerminalChooser};
pub use scaffold::create_project;
