//! Configuration data types

use crate::installation::locator::{DEFAULT_API_BASE, DEFAULT_DOWNLOAD_BASE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_GITHUB_OWNER: &str = "serene1491";

/// Contents of `config.json`. Key names match the files written by
/// earlier releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RalenConfig {
    /// Root of `versions/` and `modules/`
    #[serde(rename = "InstallDir")]
    pub install_dir: PathBuf,

    /// Owner used for catalog entries that name a repository but no owner
    #[serde(rename = "DefaultGitHubOwner")]
    pub default_github_owner: Option<String>,

    /// Configure PATH without asking when the interactive shell starts
    #[serde(rename = "AutoAddToPath")]
    pub auto_add_to_path: bool,

    /// Set once the interactive shell has asked about PATH
    #[serde(rename = "PathPromptShown")]
    pub path_prompt_shown: bool,

    #[serde(rename = "ApiBaseUrl")]
    pub api_base_url: String,

    #[serde(rename = "DownloadBaseUrl")]
    pub download_base_url: String,
}

impl RalenConfig {
    pub fn with_install_dir(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            default_github_owner: Some(DEFAULT_GITHUB_OWNER.to_string()),
            auto_add_to_path: false,
            path_prompt_shown: false,
            api_base_url: DEFAULT_API_BASE.to_string(),
            download_base_url: DEFAULT_DOWNLOAD_BASE.to_string(),
        }
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.install_dir.join("versions")
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.install_dir.join("modules")
    }
}

impl Default for RalenConfig {
    fn default() -> Self {
        let home = crate::config::loader::ConfigLoader::home_dir()
            .unwrap_or_else(|_| PathBuf::from(".ralen"));
        Self::with_install_dir(home)
    }
}
