//! Seams of the installation pipeline

use crate::catalog::{LanguageCatalog, LanguageDefinition};
use crate::errors::RalenResult;
use crate::installation::registry::RuntimeRegistry;
use crate::installation::smoke::SmokeOutcome;
use crate::installation::types::{OwnerRepo, ReleaseInfo, VersionSpec};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Talks to a release-hosting API
#[async_trait]
pub trait ReleaseLocator: Send + Sync {
    /// Resolve release metadata, falling back to a default-branch
    /// pseudo-release when the hosting API reports not-found.
    async fn resolve_release(&self, repo: &OwnerRepo, version: &VersionSpec)
        -> RalenResult<ReleaseInfo>;

    /// Pick the download URL for `definition`, or `None` when the release
    /// offers nothing usable.
    async fn select_download_url(
        &self,
        release: &ReleaseInfo,
        definition: &LanguageDefinition,
        repo: &OwnerRepo,
    ) -> RalenResult<Option<String>>;

    async fn default_branch(&self, repo: &OwnerRepo) -> RalenResult<Option<String>>;

    fn branch_archive_url(&self, repo: &OwnerRepo, branch: &str) -> String;
}

/// Guarantees installed runtimes. Implemented by the installation
/// orchestrator; the project runner only sees this trait.
#[async_trait]
pub trait RuntimeManager: Send + Sync {
    /// Make sure a runtime for `language` is installed and return the
    /// resolved version tag.
    async fn ensure_installed(
        &self,
        language: &str,
        version: &VersionSpec,
        repo_override: Option<&OwnerRepo>,
    ) -> RalenResult<String>;

    /// Tag of the newest remote release, without installing it
    async fn latest_remote_version(
        &self,
        language: &str,
        repo_override: Option<&OwnerRepo>,
    ) -> RalenResult<String>;

    /// Probe an installed runtime. Only fails when the process cannot start.
    async fn smoke_test(&self, language: &str, runtime: &Path) -> RalenResult<SmokeOutcome>;

    fn registry(&self) -> &RuntimeRegistry;

    fn catalog(&self) -> Arc<LanguageCatalog>;
}
