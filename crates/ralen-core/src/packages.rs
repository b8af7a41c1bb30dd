//! Auxiliary files downloaded into `<installDir>/modules/`

use crate::errors::{RalenError, RalenResult};
use crate::installation::transport::{file_name_from_url, ArchiveTransport};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOutcome {
    Added(PathBuf),
    AlreadyPresent(PathBuf),
}

pub struct PackageStore {
    modules_dir: PathBuf,
    transport: ArchiveTransport,
}

impl PackageStore {
    pub fn new(modules_dir: impl Into<PathBuf>, transport: ArchiveTransport) -> Self {
        Self {
            modules_dir: modules_dir.into(),
            transport,
        }
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    /// Download `url` unless a package with the same file name exists
    pub async fn add(&self, url: &str, name: Option<&str>) -> RalenResult<PackageOutcome> {
        let requested = match name {
            Some(name) => Some(validate_name(name)?.to_string()),
            None => file_name_from_url(url),
        };

        if let Some(name) = &requested {
            let target = self.modules_dir.join(name);
            if fs::try_exists(&target).await.unwrap_or(false) {
                return Ok(PackageOutcome::AlreadyPresent(target));
            }
        }

        let artifact = self.transport.download(url).await?;
        let name = requested.unwrap_or_else(|| artifact.file_name().to_string());
        let target = self.modules_dir.join(&name);
        if fs::try_exists(&target).await.unwrap_or(false) {
            return Ok(PackageOutcome::AlreadyPresent(target));
        }

        fs::create_dir_all(&self.modules_dir).await?;
        fs::copy(artifact.path(), &target).await?;
        log::info!("Added package {} ({} bytes)", name, artifact.bytes());
        Ok(PackageOutcome::Added(target))
    }

    pub async fn remove(&self, name: &str) -> RalenResult<PathBuf> {
        let target = self.modules_dir.join(validate_name(name)?);
        if !fs::try_exists(&target).await.unwrap_or(false) {
            return Err(RalenError::PackageNotFound {
                name: name.to_string(),
            });
        }
        fs::remove_file(&target).await?;
        Ok(target)
    }

    pub async fn list(&self) -> RalenResult<Vec<String>> {
        if !fs::try_exists(&self.modules_dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.modules_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn validate_name(name: &str) -> RalenResult<&str> {
    let name = name.trim();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(RalenError::InvalidArgument {
            message: format!("'{}' is not a valid package file name", name),
        });
    }
    Ok(name)
}
