//! Subcommand handlers

use crate::cli::Commands;
use anyhow::Result;
use ralen_core::installation::{build_http_client, ArchiveTransport, OwnerRepo};
use ralen_core::path_config::{PathReport, ShimKind};
use ralen_core::project::create_project;
use ralen_core::{
    ConfigLoader, InstallationOrchestrator, LanguageCatalog, PackageOutcome, PackageStore,
    PathConfigurator, ProjectRunner, RalenConfig, RalenError, RuntimeManager, VersionSpec,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration and the installation pipeline for one process
pub struct Session {
    pub home: PathBuf,
    pub config: RalenConfig,
    orchestrator: Arc<InstallationOrchestrator>,
}

impl Session {
    pub async fn open() -> Result<Self> {
        let home = ConfigLoader::home_dir()?;
        let config = ConfigLoader::load_from(&home).await?;
        let catalog = Arc::new(LanguageCatalog::builtin()?);
        let orchestrator = InstallationOrchestrator::from_config(&config, catalog)?;
        log::debug!("Using install root {}", config.install_dir.display());

        Ok(Self {
            home,
            config,
            orchestrator: Arc::new(orchestrator),
        })
    }

    /// Run one command and map its outcome to a process exit code
    pub async fn dispatch(&self, command: Commands) -> i32 {
        match self.execute(command).await {
            Ok(code) => code,
            Err(err) => report_error(&err),
        }
    }

    async fn execute(&self, command: Commands) -> Result<i32> {
        match command {
            Commands::Run {
                path,
                project,
                interactive,
            } => {
                let path = path.unwrap_or_else(|| PathBuf::from("."));
                let manager: Arc<dyn RuntimeManager> = self.orchestrator.clone();
                let code = ProjectRunner::new(manager)
                    .run(&path, project.as_deref(), interactive)
                    .await?;
                Ok(code)
            }
            Commands::Create { name, language, dir } => {
                let parent = match dir {
                    Some(dir) => dir,
                    None => std::env::current_dir()?,
                };
                let descriptor = create_project(self.orchestrator.as_ref(), &parent, &name, &language).await?;
                println!(
                    "Created {} ({} {}) in {}",
                    descriptor.name,
                    descriptor.language,
                    descriptor.version,
                    descriptor.project_dir().display()
                );
                Ok(0)
            }
            Commands::Install {
                language,
                version,
                repo,
            } => {
                if language.eq_ignore_ascii_case("all") {
                    if repo.is_some() {
                        return Err(RalenError::InvalidArgument {
                            message: "--repo cannot be combined with `install all`".to_string(),
                        }
                        .into());
                    }
                    return Ok(self.install_all().await);
                }
                let version: VersionSpec = version.parse()?;
                self.install(&language, &version, repo.as_ref()).await?;
                Ok(0)
            }
            Commands::Latest { language, repo } => {
                let tag = self.orchestrator.latest_remote_version(&language, repo.as_ref()).await?;
                println!("{}", tag);
                Ok(0)
            }
            Commands::ListKnown => {
                self.list_known();
                Ok(0)
            }
            Commands::ListInstalled { language } => {
                self.list_installed(language.as_deref())?;
                Ok(0)
            }
            Commands::ConfigurePath { no_shim } => {
                let report = PathConfigurator::for_current_user()?.configure(!no_shim)?;
                print_path_report(&report, "configured");
                if report.changed() {
                    println!("Open a new terminal or run `source ~/.profile` to pick up the change.");
                }
                Ok(0)
            }
            Commands::RemoveFromPath { remove_shim } => {
                let report = PathConfigurator::for_current_user()?.remove(remove_shim)?;
                print_path_report(&report, "removed");
                Ok(0)
            }
            Commands::AddPackage { url, name } => {
                match self.packages()?.add(&url, name.as_deref()).await? {
                    PackageOutcome::Added(path) => println!("Added {}", path.display()),
                    PackageOutcome::AlreadyPresent(path) => {
                        println!("{} already exists; left unchanged", path.display())
                    }
                }
                Ok(0)
            }
            Commands::RemovePackage { name } => {
                let path = self.packages()?.remove(&name).await?;
                println!("Removed {}", path.display());
                Ok(0)
            }
            Commands::ListPackages => {
                let names = self.packages()?.list().await?;
                if names.is_empty() {
                    println!("No packages in {}", self.config.modules_dir().display());
                }
                for name in names {
                    println!("  {}", name);
                }
                Ok(0)
            }
        }
    }

    async fn install(&self, language: &str, version: &VersionSpec, repo: Option<&OwnerRepo>) -> Result<()> {
        let tag = self.orchestrator.ensure_installed(language, version, repo).await?;
        let path = self.orchestrator.registry().path(language, &tag)?;
        println!("{} {} -> {}", language.to_lowercase(), tag, path.display());
        Ok(())
    }

    /// Latest release of every catalog language; keeps going past failures
    async fn install_all(&self) -> i32 {
        let catalog = self.orchestrator.catalog();
        let mut code = 0;
        for definition in catalog.iter() {
            if let Err(err) = self.install(&definition.key, &VersionSpec::Latest, None).await {
                eprintln!("{}: install failed", definition.key);
                code = code.max(report_error(&err));
            }
        }
        code
    }

    fn list_known(&self) {
        let catalog = self.orchestrator.catalog();
        println!("Known ralen languages:");
        for definition in catalog.iter() {
            let repo = definition
                .repository(self.config.default_github_owner.as_deref())
                .map(|r| r.to_string())
                .unwrap_or_else(|| "not configured".to_string());
            println!("  {}  (repo: {})", definition.key, repo);
        }
    }

    fn list_installed(&self, language: Option<&str>) -> Result<()> {
        let catalog = self.orchestrator.catalog();
        let registry = self.orchestrator.registry();
        let keys: Vec<String> = match language {
            Some(language) => vec![catalog.require(language)?.key.clone()],
            None => catalog.iter().map(|d| d.key.clone()).collect(),
        };

        let mut any = false;
        for key in keys {
            let versions = registry.list_installed_versions(&key)?;
            if versions.is_empty() {
                continue;
            }
            any = true;
            println!("{}:", key);
            for version in versions {
                match registry.manifest(&key, &version) {
                    Some(manifest) => println!(
                        "  {}  (installed {}, {})",
                        version,
                        manifest.installed_at.format("%Y-%m-%d %H:%M UTC"),
                        manifest.executable
                    ),
                    None => println!("  {}", version),
                }
            }
        }
        if !any {
            println!("No runtimes installed under {}", self.config.versions_dir().display());
        }
        Ok(())
    }

    fn packages(&self) -> Result<PackageStore> {
        let transport = ArchiveTransport::new(build_http_client(None)?);
        Ok(PackageStore::new(self.config.modules_dir(), transport))
    }
}

pub fn print_path_report(report: &PathReport, verb: &str) {
    if let Some((shim, kind)) = &report.shim {
        let kind = match kind {
            ShimKind::Symlink => "symlink",
            ShimKind::WrapperScript => "wrapper script",
            ShimKind::WindowsCmd => "cmd shim",
        };
        println!("Shim {}: {} ({})", verb, shim.display(), kind);
    }
    for profile in &report.profiles_updated {
        println!("PATH entry {} in {}", verb, profile.display());
    }
    if !report.changed() {
        println!("Nothing to do; PATH is already {}.", verb);
    }
}

/// Print an error with its follow-up hints and return the exit code
pub fn report_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<RalenError>() {
        Some(ralen_err) => {
            eprintln!("Error: {}", ralen_err);
            let suggestions = ralen_err.suggestions();
            if !suggestions.is_empty() {
                eprintln!("Suggestions:");
                for suggestion in suggestions {
                    eprintln!("  - {}", suggestion);
                }
            }
            ralen_err.exit_code()
        }
        None => {
            eprintln!("Error: {:#}", err);
            2
        }
    }
}
