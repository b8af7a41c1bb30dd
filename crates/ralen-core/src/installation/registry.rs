//! Path computations for installed runtimes under `<root>/versions/`

use crate::catalog::LanguageCatalog;
use crate::errors::RalenResult;
use crate::installation::types::{InstallManifest, MANIFEST_FILE};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RuntimeRegistry {
    root: PathBuf,
    catalog: Arc<LanguageCatalog>,
}

impl RuntimeRegistry {
    pub fn new(root: impl Into<PathBuf>, catalog: Arc<LanguageCatalog>) -> Self {
        Self {
            root: root.into(),
            catalog,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn language_dir(&self, language: &str) -> PathBuf {
        self.root.join("versions").join(self.language_key(language))
    }

    pub fn version_dir(&self, language: &str, version: &str) -> PathBuf {
        self.language_dir(language).join(version)
    }

    /// Expected location of the runtime executable
    pub fn path(&self, language: &str, version: &str) -> RalenResult<PathBuf> {
        let definition = self.catalog.require(language)?;
        Ok(self
            .version_dir(language, version)
            .join("bin")
            .join(definition.canonical_executable_name()))
    }

    pub fn is_installed(&self, language: &str, version: &str) -> bool {
        self.path(language, version)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Names of the version directories, in directory enumeration order
    pub fn list_installed_versions(&self, language: &str) -> io::Result<Vec<String>> {
        let dir = self.language_dir(language);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                versions.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(versions)
    }

    /// Manifest written at install time, if present and readable
    pub fn manifest(&self, language: &str, version: &str) -> Option<InstallManifest> {
        let path = self.version_dir(language, version).join(MANIFEST_FILE);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                log::debug!("Ignoring unreadable manifest {}: {}", path.display(), e);
                None
            }
        }
    }

    fn language_key(&self, language: &str) -> String {
        self.catalog
            .get(language)
            .map(|def| def.key.clone())
            .unwrap_or_else(|| language.to_lowercase())
    }
}
