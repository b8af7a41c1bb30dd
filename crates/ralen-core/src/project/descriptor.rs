use crate::catalog::LanguageDefinition;
use crate::errors::{RalenError, RalenResult};
use crate::installation::types::VersionSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const PROJECT_EXTENSION: &str = "ralenproj";

/// On-disk JSON shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProjectFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    entry: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    pub project_file: PathBuf,
    pub name: String,
    pub language: String,
    /// Version specifier; `latest` when the file has none
    pub version: String,
    pub entry: Option<String>,
}

impl ProjectDescriptor {
    pub async fn load(path: &Path) -> RalenResult<Self> {
        let content = fs::read_to_string(path).await.map_err(|e| RalenError::InvalidProject {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> RalenResult<Self> {
        let file: ProjectFile = serde_json::from_str(content).map_err(|e| RalenError::InvalidProject {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if file.language.trim().is_empty() {
            return Err(RalenError::InvalidProject {
                path: path.to_path_buf(),
                reason: "missing \"language\"".to_string(),
            });
        }

        let name = file
            .name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_default();

        Ok(Self {
            project_file: path.to_path_buf(),
            name,
            language: file.language.trim().to_string(),
            version: file
                .version
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "latest".to_string()),
            entry: file.entry.filter(|e| !e.trim().is_empty()),
        })
    }

    pub async fn save(&self) -> RalenResult<()> {
        let file = ProjectFile {
            name: Some(self.name.clone()),
            language: self.language.clone(),
            version: Some(self.version.clone()),
            entry: self.entry.clone(),
        };
        fs::write(&self.project_file, serde_json::to_string_pretty(&file)?).await?;
        Ok(())
    }

    pub fn project_dir(&self) -> &Path {
        self.project_file.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn version_spec(&self) -> VersionSpec {
        self.version.parse().unwrap_or(VersionSpec::Latest)
    }

    /// Entry file, defaulting to the language's conventional name
    pub fn entry_path(&self, definition: &LanguageDefinition) -> PathBuf {
        let entry = self.entry.as_deref().unwrap_or(&definition.default_entry);
        self.project_dir().join(entry)
    }
}

/// Project files directly inside `dir`, sorted by path
pub async fn discover_projects(dir: &Path) -> RalenResult<Vec<PathBuf>> {
    let mut projects = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_project = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(PROJECT_EXTENSION));
        if is_project && entry.file_type().await?.is_file() {
            projects.push(path);
        }
    }
    projects.sort();
    Ok(projects)
}
