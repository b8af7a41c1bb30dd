//! Installation orchestrator: turns `(language, version)` into an installed,
//! smoke-tested runtime.

use crate::catalog::{LanguageCatalog, LanguageDefinition};
use crate::config::RalenConfig;
use crate::errors::{RalenError, RalenResult};
use crate::installation::archive::{file_sha256, ArchiveInstaller, InstallLayout};
use crate::installation::events::{InstallEvent, InstallObserver, LogObserver};
use crate::installation::locator::GitHubReleaseLocator;
use crate::installation::registry::RuntimeRegistry;
use crate::installation::smoke::{SmokeOutcome, SmokeTester};
use crate::installation::traits::{ReleaseLocator, RuntimeManager};
use crate::installation::transport::{build_http_client, ArchiveTransport};
use crate::installation::types::{InstallManifest, OwnerRepo, ReleaseInfo, VersionSpec, MANIFEST_FILE};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct InstallationOrchestrator {
    catalog: Arc<LanguageCatalog>,
    registry: RuntimeRegistry,
    locator: Arc<dyn ReleaseLocator>,
    transport: ArchiveTransport,
    installer: ArchiveInstaller,
    smoke: SmokeTester,
    observer: Arc<dyn InstallObserver>,
    default_owner: Option<String>,
}

impl InstallationOrchestrator {
    pub fn new(
        catalog: Arc<LanguageCatalog>,
        registry: RuntimeRegistry,
        locator: Arc<dyn ReleaseLocator>,
        transport: ArchiveTransport,
    ) -> Self {
        Self {
            catalog,
            registry,
            locator,
            transport,
            installer: ArchiveInstaller::new(),
            smoke: SmokeTester::new(),
            observer: Arc::new(LogObserver),
            default_owner: None,
        }
    }

    /// Wire up the GitHub locator and transport from user configuration.
    /// `GITHUB_TOKEN` is picked up from the environment.
    pub fn from_config(config: &RalenConfig, catalog: Arc<LanguageCatalog>) -> RalenResult<Self> {
        let token = std::env::var("GITHUB_TOKEN").ok();
        let client = build_http_client(token.as_deref())?;

        let locator = GitHubReleaseLocator::new(client.clone())
            .with_api_base(&config.api_base_url)
            .with_download_base(&config.download_base_url);
        let registry = RuntimeRegistry::new(&config.install_dir, catalog.clone());

        let mut orchestrator = Self::new(catalog, registry, Arc::new(locator), ArchiveTransport::new(client));
        orchestrator.default_owner = config.default_github_owner.clone();
        Ok(orchestrator)
    }

    pub fn with_observer(mut self, observer: Arc<dyn InstallObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_smoke_tester(mut self, smoke: SmokeTester) -> Self {
        self.smoke = smoke;
        self
    }

    pub fn with_default_owner(mut self, owner: Option<String>) -> Self {
        self.default_owner = owner;
        self
    }

    fn emit(&self, event: InstallEvent) {
        self.observer.on_event(&event);
    }

    fn effective_repo(
        &self,
        definition: &LanguageDefinition,
        repo_override: Option<&OwnerRepo>,
    ) -> RalenResult<OwnerRepo> {
        repo_override
            .cloned()
            .or_else(|| definition.repository(self.default_owner.as_deref()))
            .ok_or_else(|| RalenError::NoRepository {
                language: definition.key.clone(),
            })
    }

    async fn download_url(
        &self,
        release: &ReleaseInfo,
        definition: &LanguageDefinition,
        repo: &OwnerRepo,
        tag: &str,
    ) -> RalenResult<String> {
        if let Some(url) = self.locator.select_download_url(release, definition, repo).await? {
            return Ok(url);
        }

        if let Some(branch) = self.locator.default_branch(repo).await? {
            let url = self.locator.branch_archive_url(repo, &branch);
            self.emit(InstallEvent::FallingBackToDefaultBranch {
                branch,
                url: url.clone(),
            });
            return Ok(url);
        }

        Err(RalenError::NoDownloadableAsset {
            owner: repo.owner.clone(),
            repo: repo.repo.clone(),
            tag: tag.to_string(),
        })
    }

    /// Download `url` and install it as `definition`/`tag`. The version
    /// directory is replaced wholesale and removed again if installation fails.
    async fn install_from(
        &self,
        definition: &LanguageDefinition,
        tag: &str,
        url: &str,
    ) -> RalenResult<InstallLayout> {
        if reqwest::Url::parse(url).is_err() {
            return Err(RalenError::InvalidArgument {
                message: format!("download URL is not absolute: {}", url),
            });
        }

        self.emit(InstallEvent::Downloading { url: url.to_string() });
        // Dropping the artifact removes its temporary directory
        let artifact = self.transport.download(url).await?;
        self.emit(InstallEvent::Downloaded {
            path: artifact.path().to_path_buf(),
            bytes: artifact.bytes(),
        });

        let version_dir = self.registry.version_dir(&definition.key, tag);
        if tokio::fs::try_exists(&version_dir).await.unwrap_or(false) {
            log::debug!("Removing previous installation at {}", version_dir.display());
            tokio::fs::remove_dir_all(&version_dir).await?;
        }
        tokio::fs::create_dir_all(&version_dir).await?;

        let installer = self.installer.clone();
        let artifact_path = artifact.path().to_path_buf();
        let target = version_dir.clone();
        let def = definition.clone();
        let result = tokio::task::spawn_blocking(move || installer.install(&artifact_path, &target, &def))
            .await
            .map_err(|e| RalenError::Extraction {
                path: artifact.path().to_path_buf(),
                reason: format!("installer task failed: {}", e),
            })
            .and_then(|inner| inner);

        match result {
            Ok(layout) => Ok(layout),
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_dir_all(&version_dir).await {
                    log::warn!(
                        "Failed to remove incomplete installation {}: {}",
                        version_dir.display(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    async fn write_manifest(&self, definition: &LanguageDefinition, tag: &str, url: &str, executable: &Path) {
        let manifest_path = self.registry.version_dir(&definition.key, tag).join(MANIFEST_FILE);
        let executable = executable.to_path_buf();
        let sha256 = tokio::task::spawn_blocking({
            let executable = executable.clone();
            move || file_sha256(&executable).ok()
        })
        .await
        .ok()
        .flatten();

        let manifest = InstallManifest {
            language: definition.key.clone(),
            version: tag.to_string(),
            source_url: url.to_string(),
            installed_at: chrono::Utc::now(),
            executable: executable
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            sha256,
        };

        let written = match serde_json::to_string_pretty(&manifest) {
            Ok(json) => tokio::fs::write(&manifest_path, json).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = written {
            log::warn!("Could not write install manifest {}: {}", manifest_path.display(), e);
        }
    }

    /// Post-install probe. Never fails the install.
    async fn probe(&self, definition: &LanguageDefinition, executable: Option<&Path>) {
        let Some(executable) = executable else {
            self.emit(InstallEvent::SmokeTestSkipped {
                reason: format!("no runtime file was installed for {}", definition.key),
            });
            return;
        };

        if let Err(e) = self.smoke.run(executable, &definition.version_arg, self.observer.as_ref()).await {
            self.emit(InstallEvent::SmokeTestSkipped {
                reason: e.to_string(),
            });
        }
    }
}

/// Reject tags that would escape `versions/<language>/` when used as a directory name
fn validate_tag(tag: &str) -> RalenResult<()> {
    if tag.is_empty() || tag == "." || tag == ".." || tag.contains(['/', '\\']) {
        return Err(RalenError::InvalidArgument {
            message: format!("'{}' cannot be used as a version directory name", tag),
        });
    }
    Ok(())
}

/// Directory name for a tag the hosting service handed back. Branch names
/// such as `release/x` become `release-x`.
fn version_dir_name(tag: &str) -> RalenResult<String> {
    let name = tag.replace(['/', '\\'], "-");
    validate_tag(&name)?;
    Ok(name)
}

#[async_trait]
impl RuntimeManager for InstallationOrchestrator {
    async fn ensure_installed(
        &self,
        language: &str,
        version: &VersionSpec,
        repo_override: Option<&OwnerRepo>,
    ) -> RalenResult<String> {
        let definition = self.catalog.require(language)?;
        let repo = self.effective_repo(definition, repo_override)?;

        if let VersionSpec::Tag(tag) = version {
            validate_tag(tag)?;
            if self.registry.is_installed(&definition.key, tag) {
                self.emit(InstallEvent::AlreadyInstalled {
                    language: definition.key.clone(),
                    version: tag.clone(),
                });
                return Ok(tag.clone());
            }
        }

        self.emit(InstallEvent::ResolvingRelease {
            owner: repo.owner.clone(),
            repo: repo.repo.clone(),
            version: version.to_string(),
        });
        let release = self.locator.resolve_release(&repo, version).await?;
        let resolved = release.version_tag().ok_or_else(|| RalenError::ReleaseNotFound {
            owner: repo.owner.clone(),
            repo: repo.repo.clone(),
            version: version.to_string(),
        })?;
        let tag = version_dir_name(resolved)?;
        self.emit(InstallEvent::ReleaseResolved { tag: tag.clone() });

        if self.registry.is_installed(&definition.key, &tag) {
            self.emit(InstallEvent::AlreadyInstalled {
                language: definition.key.clone(),
                version: tag.clone(),
            });
            return Ok(tag);
        }

        let url = self.download_url(&release, definition, &repo, &tag).await?;
        let layout = self.install_from(definition, &tag, &url).await?;

        let registered = self.registry.path(&definition.key, &tag)?;
        let executable: Option<PathBuf> = if registered.is_file() {
            Some(registered)
        } else {
            self.emit(InstallEvent::NoRecognizedExecutable {
                language: definition.key.clone(),
                version: tag.clone(),
            });
            layout.executable.clone()
        };

        if let Some(executable) = &executable {
            self.write_manifest(definition, &tag, &url, executable).await;
            self.emit(InstallEvent::Installed {
                language: definition.key.clone(),
                version: tag.clone(),
                executable: executable.clone(),
            });
        }
        self.probe(definition, executable.as_deref()).await;

        Ok(tag)
    }

    async fn latest_remote_version(
        &self,
        language: &str,
        repo_override: Option<&OwnerRepo>,
    ) -> RalenResult<String> {
        let definition = self.catalog.require(language)?;
        let repo = self.effective_repo(definition, repo_override)?;
        let release = self.locator.resolve_release(&repo, &VersionSpec::Latest).await?;
        release
            .version_tag()
            .map(str::to_string)
            .ok_or_else(|| RalenError::ReleaseNotFound {
                owner: repo.owner.clone(),
                repo: repo.repo.clone(),
                version: "latest".to_string(),
            })
    }

    async fn smoke_test(&self, language: &str, runtime: &Path) -> RalenResult<SmokeOutcome> {
        let definition = self.catalog.require(language)?;
        self.smoke
            .run(runtime, &definition.version_arg, self.observer.as_ref())
            .await
    }

    fn registry(&self) -> &RuntimeRegistry {
        &self.registry
    }

    fn catalog(&self) -> Arc<LanguageCatalog> {
        self.catalog.clone()
    }
}
