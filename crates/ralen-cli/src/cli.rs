use clap::{Parser, Subcommand};
use ralen_core::installation::OwnerRepo;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "ralen",
    author,
    version,
    about = "Install language runtimes from GitHub releases and run projects with them"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Option<Commands>,

    #[clap(long, short, default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run the project in a directory (or a project file) with its pinned runtime
    Run {
        /// Project directory or `.ralenproj` file
        path: Option<PathBuf>,

        #[clap(long, help = "Project file to use when the directory holds several")]
        project: Option<PathBuf>,

        #[clap(long, help = "Ask which project to run when several are found")]
        interactive: bool,
    },

    /// Create a new project pinned to the latest runtime release
    #[clap(visible_aliases = ["new", "make"])]
    Create {
        name: String,

        #[clap(long, alias = "lang", default_value = "salang")]
        language: String,

        #[clap(long, help = "Parent directory (defaults to the current directory)")]
        dir: Option<PathBuf>,
    },

    /// Install a runtime version, or `all` for the latest of every known language
    #[clap(alias = "install-lang")]
    Install {
        language: String,

        #[clap(default_value = "latest")]
        version: String,

        #[clap(long, help = "Install from owner/repo instead of the catalog repository")]
        repo: Option<OwnerRepo>,
    },

    /// Show the latest released version without installing it
    Latest {
        language: String,

        #[clap(long)]
        repo: Option<OwnerRepo>,
    },

    /// List the languages ralen can install
    ListKnown,

    /// List installed runtime versions
    ListInstalled {
        /// Only this language
        language: Option<String>,
    },

    /// Put the `ralen` command on the user's PATH
    #[clap(visible_alias = "add-to-path")]
    ConfigurePath {
        #[clap(long, help = "Only update shell profiles")]
        no_shim: bool,
    },

    /// Undo `configure-path`
    RemoveFromPath {
        #[clap(long, help = "Also delete the shim")]
        remove_shim: bool,
    },

    /// Download a file into the modules directory
    AddPackage {
        url: String,

        #[clap(long, help = "File name to store the package under")]
        name: Option<String>,
    },

    /// Delete a file from the modules directory
    RemovePackage { name: String },

    /// List the modules directory
    ListPackages,
}
