use crate::errors::{RalenError, RalenResult};
use crate::installation::traits::RuntimeManager;
use crate::installation::types::VersionSpec;
use crate::project::descriptor::{ProjectDescriptor, PROJECT_EXTENSION};
use std::path::Path;
use tokio::fs;

/// Create `<parent>/<name>/` with a project file pinned to the latest
/// release of `language` and a starter entry file.
pub async fn create_project(
    manager: &dyn RuntimeManager,
    parent: &Path,
    name: &str,
    language: &str,
) -> RalenResult<ProjectDescriptor> {
    let name = name.trim();
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(RalenError::InvalidArgument {
            message: format!("'{}' is not a valid project name", name),
        });
    }

    let catalog = manager.catalog();
    let definition = catalog.require(language)?;

    let project_dir = parent.join(name);
    if fs::try_exists(&project_dir).await.unwrap_or(false) {
        let mut entries = fs::read_dir(&project_dir).await?;
        if entries.next_entry().await?.is_some() {
            return Err(RalenError::InvalidArgument {
                message: format!("{} already exists and is not empty", project_dir.display()),
            });
        }
    }

    let version = manager
        .ensure_installed(&definition.key, &VersionSpec::Latest, None)
        .await
        .map_err(|e| RalenError::EnsureFailed {
            language: definition.key.clone(),
            source: Box::new(e),
        })?;

    fs::create_dir_all(&project_dir).await?;

    let descriptor = ProjectDescriptor {
        project_file: project_dir.join(format!("{}.{}", name, PROJECT_EXTENSION)),
        name: name.to_string(),
        language: definition.key.clone(),
        version,
        entry: Some(definition.default_entry.clone()),
    };
    descriptor.save().await?;

    let entry = descriptor.entry_path(definition);
    fs::write(&entry, &definition.entry_template).await?;

    log::info!("Created project {} at {}", name, project_dir.display());
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LanguageCatalog;
    use crate::installation::registry::RuntimeRegistry;
    use crate::installation::smoke::SmokeOutcome;
    use crate::installation::types::OwnerRepo;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct PinnedManager {
        catalog: Arc<LanguageCatalog>,
        registry: RuntimeRegistry,
    }

    impl PinnedManager {
        fn new(root: &Path) -> Self {
            let catalog = Arc::new(LanguageCatalog::builtin().unwrap());
            Self {
                registry: RuntimeRegistry::new(root, catalog.clone()),
                catalog,
            }
        }
    }

    #[async_trait]
    impl RuntimeManager for PinnedManager {
        async fn ensure_installed(&self, _: &str, _: &VersionSpec, _: Option<&OwnerRepo>) -> RalenResult<String> {
            Ok("v1.2.0".to_string())
        }

        async fn latest_remote_version(&self, _: &str, _: Option<&OwnerRepo>) -> RalenResult<String> {
            Ok("v1.2.0".to_string())
        }

        async fn smoke_test(&self, _: &str, _: &Path) -> RalenResult<SmokeOutcome> {
            Ok(SmokeOutcome::Passed)
        }

        fn registry(&self) -> &RuntimeRegistry {
            &self.registry
        }

        fn catalog(&self) -> Arc<LanguageCatalog> {
            self.catalog.clone()
        }
    }

    #[tokio::test]
    async fn creates_pinned_project_and_entry() {
        let root = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let manager = PinnedManager::new(root.path());

        let descriptor = create_project(&manager, workspace.path(), "hello", "SaLang").await.unwrap();

        let project_file = workspace.path().join("hello").join("hello.ralenproj");
        assert_eq!(descriptor.project_file, project_file);
        let loaded = ProjectDescriptor::load(&project_file).await.unwrap();
        assert_eq!(loaded.language, "salang");
        assert_eq!(loaded.version, "v1.2.0");
        assert_eq!(loaded.entry.as_deref(), Some("main.sr"));

        let entry = std::fs::read_to_string(workspace.path().join("hello").join("main.sr")).unwrap();
        assert!(entry.contains("hello ralen"));
    }

    #[tokio::test]
    async fn refuses_bad_names_and_occupied_directories() {
        let root = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let manager = PinnedManager::new(root.path());

        assert!(create_project(&manager, workspace.path(), "../escape", "salang").await.is_err());
        assert!(create_project(&manager, workspace.path(), "", "salang").await.is_err());

        std::fs::create_dir_all(workspace.path().join("taken")).unwrap();
        std::fs::write(workspace.path().join("taken").join("file"), "x").unwrap();
        let err = create_project(&manager, workspace.path(), "taken", "salang").await.unwrap_err();
        assert!(matches!(err, RalenError::InvalidArgument { .. }));

        let err = create_project(&manager, workspace.path(), "other", "cobol").await.unwrap_err();
        assert!(matches!(err, RalenError::UnknownLanguage { .. }));
    }
}
