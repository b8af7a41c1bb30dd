//! User configuration persisted as `config.json` in the ralen home directory.
//!
//! The home directory is `$RALEN_HOME` when set, otherwise `~/.ralen`. The
//! file is created with defaults on first use.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;
