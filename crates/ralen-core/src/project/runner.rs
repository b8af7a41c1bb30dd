//! Runs a project's entry file with its pinned runtime

use crate::errors::{RalenError, RalenResult};
use crate::installation::events::{InstallEvent, InstallObserver, LogObserver};
use crate::installation::traits::RuntimeManager;
use crate::project::descriptor::{discover_projects, ProjectDescriptor, PROJECT_EXTENSION};
use async_trait::async_trait;
use dialoguer::{theme::ColorfulTheme, Select};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::Command;

/// Picks one of several project files when a directory holds more than one
#[async_trait]
pub trait ProjectChooser: Send + Sync {
    /// Whether a person is available to answer
    fn is_interactive(&self) -> bool;

    /// Index into `candidates`, or `None` if the user declined
    async fn choose(&self, candidates: &[PathBuf]) -> RalenResult<Option<usize>>;
}

/// Prompts on the terminal with an indexed list
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalChooser;

#[async_trait]
impl ProjectChooser for TerminalChooser {
    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
    }

    async fn choose(&self, candidates: &[PathBuf]) -> RalenResult<Option<usize>> {
        let items: Vec<String> = candidates
            .iter()
            .map(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| p.display().to_string())
            })
            .collect();

        prompt_off_runtime(move || {
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Multiple projects found. Which one should run?")
                .items(&items)
                .default(0)
                .interact_opt()
                .map_err(|e| e.to_string())
        })
        .await
    }
}

/// Runs a synchronous prompt on the blocking pool so the async workers stay free
async fn prompt_off_runtime<F>(prompt: F) -> RalenResult<Option<usize>>
where
    F: FnOnce() -> Result<Option<usize>, String> + Send + 'static,
{
    tokio::task::spawn_blocking(prompt)
        .await
        .map_err(|e| RalenError::Io {
            message: format!("Selection prompt did not finish: {}", e),
        })?
        .map_err(|e| RalenError::Io {
            message: format!("Failed to read selection: {}", e),
        })
}

pub struct ProjectRunner {
    manager: Arc<dyn RuntimeManager>,
    observer: Arc<dyn InstallObserver>,
    chooser: Box<dyn ProjectChooser>,
}

impl ProjectRunner {
    pub fn new(manager: Arc<dyn RuntimeManager>) -> Self {
        Self {
            manager,
            observer: Arc::new(LogObserver),
            chooser: Box::new(TerminalChooser),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn InstallObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_chooser(mut self, chooser: Box<dyn ProjectChooser>) -> Self {
        self.chooser = chooser;
        self
    }

    /// Find the project to run. `path` may be a directory or a project file;
    /// a project file counts as the explicit choice unless `explicit` is set.
    pub async fn resolve_project(
        &self,
        path: &Path,
        explicit: Option<&Path>,
        interactive: bool,
    ) -> RalenResult<ProjectDescriptor> {
        let metadata = tokio::fs::metadata(path).await.map_err(|_| RalenError::ProjectNotFound {
            message: format!("{} does not exist", path.display()),
        })?;

        let (dir, implied) = if metadata.is_dir() {
            (path.to_path_buf(), None)
        } else {
            let parent = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            };
            (parent, Some(path.to_path_buf()))
        };
        let dir = tokio::fs::canonicalize(&dir).await?;
        let explicit = explicit.map(Path::to_path_buf).or(implied);

        let candidates = discover_projects(&dir).await?;

        let chosen = if let Some(explicit) = explicit {
            match_explicit(&dir, &explicit, &candidates)
                .await
                .ok_or_else(|| RalenError::ProjectNotFound {
                    message: format!("{} is not a project file in {}", explicit.display(), dir.display()),
                })?
        } else {
            match candidates.len() {
                0 => {
                    return Err(RalenError::ProjectNotFound {
                        message: format!("no *.{} file in {}", PROJECT_EXTENSION, dir.display()),
                    })
                }
                1 => candidates[0].clone(),
                _ if interactive && self.chooser.is_interactive() => {
                    match self.chooser.choose(&candidates).await? {
                        Some(index) if index < candidates.len() => candidates[index].clone(),
                        _ => {
                            return Err(RalenError::ProjectNotFound {
                                message: "no project selected".to_string(),
                            })
                        }
                    }
                }
                _ => {
                    return Err(RalenError::AmbiguousProject {
                        directory: dir,
                        candidates,
                    })
                }
            }
        };

        ProjectDescriptor::load(&chosen).await
    }

    /// Run a project with the process's own stdout and stderr
    pub async fn run(&self, path: &Path, explicit: Option<&Path>, interactive: bool) -> RalenResult<i32> {
        let (code, _, _) = self
            .run_with_output(path, explicit, interactive, tokio::io::stdout(), tokio::io::stderr())
            .await?;
        Ok(code)
    }

    /// Run a project, streaming its output into the given writers. The
    /// writers are handed back once the process has exited.
    pub async fn run_with_output<O, E>(
        &self,
        path: &Path,
        explicit: Option<&Path>,
        interactive: bool,
        stdout: O,
        stderr: E,
    ) -> RalenResult<(i32, O, E)>
    where
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        let project = self.resolve_project(path, explicit, interactive).await?;
        log::debug!("Running project {} ({})", project.name, project.project_file.display());

        let catalog = self.manager.catalog();
        let definition = catalog.require(&project.language)?;

        let tag = self
            .manager
            .ensure_installed(&definition.key, &project.version_spec(), None)
            .await
            .map_err(|e| RalenError::EnsureFailed {
                language: definition.key.clone(),
                source: Box::new(e),
            })?;

        if definition.is_known_bad(&tag) {
            self.observer.on_event(&InstallEvent::KnownBadVersion {
                language: definition.key.clone(),
                version: tag.clone(),
            });
        }

        let runtime = self.manager.registry().path(&definition.key, &tag)?;
        if !runtime.is_file() {
            return Err(RalenError::RuntimeInconsistency {
                language: definition.key.clone(),
                version: tag,
                path: runtime,
            });
        }

        self.manager.smoke_test(&definition.key, &runtime).await?;

        let entry = project.entry_path(definition);
        if !tokio::fs::try_exists(&entry).await.unwrap_or(false) {
            if let Some(parent) = entry.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let placeholder = if definition.entry_template.is_empty() {
                format!("// example entry for {}\n", definition.key)
            } else {
                definition.entry_template.clone()
            };
            tokio::fs::write(&entry, placeholder).await?;
            log::info!("Created placeholder entry file {}", entry.display());
        }

        execute_runtime(&runtime, &entry, stdout, stderr).await
    }
}

async fn match_explicit(dir: &Path, explicit: &Path, candidates: &[PathBuf]) -> Option<PathBuf> {
    let resolved = if tokio::fs::try_exists(explicit).await.unwrap_or(false) {
        explicit.to_path_buf()
    } else {
        dir.join(explicit)
    };
    let resolved = tokio::fs::canonicalize(&resolved).await.ok()?;

    for candidate in candidates {
        if let Ok(canonical) = tokio::fs::canonicalize(candidate).await {
            if canonical == resolved {
                return Some(candidate.clone());
            }
        }
    }
    None
}

/// Launch `runtime <entry>` in the entry's directory and copy its stdout and
/// stderr into the given writers until both streams close.
pub async fn execute_runtime<O, E>(
    runtime: &Path,
    entry: &Path,
    mut stdout: O,
    mut stderr: E,
) -> RalenResult<(i32, O, E)>
where
    O: AsyncWrite + Unpin + Send + 'static,
    E: AsyncWrite + Unpin + Send + 'static,
{
    let working_dir = entry
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut child = Command::new(runtime)
        .arg(entry)
        .current_dir(working_dir)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| RalenError::ProcessLaunch {
            path: runtime.to_path_buf(),
            reason: e.to_string(),
        })?;

    let (Some(mut child_stdout), Some(mut child_stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(RalenError::ProcessLaunch {
            path: runtime.to_path_buf(),
            reason: "output pipes were not captured".to_string(),
        });
    };

    let stdout_task = tokio::spawn(async move {
        tokio::io::copy(&mut child_stdout, &mut stdout).await?;
        stdout.flush().await?;
        Ok::<_, std::io::Error>(stdout)
    });
    let stderr_task = tokio::spawn(async move {
        tokio::io::copy(&mut child_stderr, &mut stderr).await?;
        stderr.flush().await?;
        Ok::<_, std::io::Error>(stderr)
    });

    let status = child.wait().await?;

    let join_error = |e: tokio::task::JoinError| RalenError::Io {
        message: format!("output forwarding task failed: {}", e),
    };
    let stdout = stdout_task.await.map_err(join_error)??;
    let stderr = stderr_task.await.map_err(join_error)??;

    Ok((exit_code(status), stdout, stderr))
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
