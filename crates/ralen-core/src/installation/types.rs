//! Value types passed between the installation components

use crate::errors::RalenError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which release a caller asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    Latest,
    Tag(String),
}

impl VersionSpec {
    pub fn is_latest(&self) -> bool {
        matches!(self, VersionSpec::Latest)
    }
}

impl FromStr for VersionSpec {
    type Err = RalenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(RalenError::InvalidArgument {
                message: "version must be `latest` or a release tag".to_string(),
            }),
            "latest" => Ok(VersionSpec::Latest),
            tag => Ok(VersionSpec::Tag(tag.to_string())),
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Latest => write!(f, "latest"),
            VersionSpec::Tag(tag) => write!(f, "{}", tag),
        }
    }
}

/// A hosting repository, given as `owner/repo`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRepo {
    pub owner: String,
    pub repo: String,
}

impl OwnerRepo {
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        }
    }
}

impl FromStr for OwnerRepo {
    type Err = RalenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, repo))
                if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
            {
                Ok(OwnerRepo::new(owner, repo))
            }
            _ => Err(RalenError::InvalidArgument {
                message: format!("expected a repository as owner/repo, got '{}'", s),
            }),
        }
    }
}

impl fmt::Display for OwnerRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A downloadable file attached to a release
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// Release metadata as returned by the hosting API.
///
/// Synthesized for default-branch fallbacks, in which case `assets` is empty
/// and only `zipball_url` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
    #[serde(default)]
    pub zipball_url: Option<String>,
    #[serde(default)]
    pub tarball_url: Option<String>,
}

impl ReleaseInfo {
    /// Tag, falling back to the display name. Blank values count as absent.
    pub fn version_tag(&self) -> Option<&str> {
        self.tag_name
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.name.as_deref().filter(|n| !n.trim().is_empty()))
    }
}

/// Repository metadata; only the default branch matters here
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RepositoryInfo {
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// Written next to `bin/` after a successful install
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallManifest {
    pub language: String,
    pub version: String,
    pub source_url: String,
    pub installed_at: DateTime<Utc>,
    pub executable: String,
    pub sha256: Option<String>,
}

pub const MANIFEST_FILE: &str = "ralen-install.json";

/// Platform facts that influence asset selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
}

impl Platform {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
        }
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }
}
