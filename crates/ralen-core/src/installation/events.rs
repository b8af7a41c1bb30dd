//! Progress reporting for the installation pipeline.
//!
//! The pipeline never writes to the console. It emits [`InstallEvent`]s to an
//! [`InstallObserver`]; [`LogObserver`] forwards them to the `log` facade.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallEvent {
    AlreadyInstalled {
        language: String,
        version: String,
    },
    ResolvingRelease {
        owner: String,
        repo: String,
        version: String,
    },
    ReleaseResolved {
        tag: String,
    },
    FallingBackToDefaultBranch {
        branch: String,
        url: String,
    },
    Downloading {
        url: String,
    },
    Downloaded {
        path: PathBuf,
        bytes: u64,
    },
    Installed {
        language: String,
        version: String,
        executable: PathBuf,
    },
    NoRecognizedExecutable {
        language: String,
        version: String,
    },
    SmokeTestPassed {
        executable: PathBuf,
    },
    SmokeTestTimedOut {
        executable: PathBuf,
        timeout: Duration,
    },
    SmokeTestFailed {
        executable: PathBuf,
        exit_code: Option<i32>,
        stderr: String,
    },
    SmokeTestSkipped {
        reason: String,
    },
    KnownBadVersion {
        language: String,
        version: String,
    },
}

impl InstallEvent {
    /// Events that describe something the user should look at
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            InstallEvent::NoRecognizedExecutable { .. }
                | InstallEvent::SmokeTestTimedOut { .. }
                | InstallEvent::SmokeTestFailed { .. }
                | InstallEvent::SmokeTestSkipped { .. }
                | InstallEvent::KnownBadVersion { .. }
        )
    }
}

pub trait InstallObserver: Send + Sync {
    fn on_event(&self, event: &InstallEvent);
}

/// Default observer: writes events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl InstallObserver for LogObserver {
    fn on_event(&self, event: &InstallEvent) {
        match event {
            InstallEvent::AlreadyInstalled { language, version } => {
                log::info!("{} {} is already installed", language, version)
            }
            InstallEvent::ResolvingRelease {
                owner,
                repo,
                version,
            } => log::info!("Resolving {} release of {}/{}", version, owner, repo),
            InstallEvent::ReleaseResolved { tag } => log::debug!("Resolved release {}", tag),
            InstallEvent::FallingBackToDefaultBranch { branch, url } => log::info!(
                "No release asset found, using archive of branch '{}': {}",
                branch,
                url
            ),
            InstallEvent::Downloading { url } => log::info!("Downloading {}", url),
            InstallEvent::Downloaded { path, bytes } => {
                log::debug!("Downloaded {} bytes to {}", bytes, path.display())
            }
            InstallEvent::Installed {
                language,
                version,
                executable,
            } => log::info!(
                "Installed {} {} at {}",
                language,
                version,
                executable.display()
            ),
            InstallEvent::NoRecognizedExecutable { language, version } => log::warn!(
                "No recognizable {} runtime in the {} download; kept a best-effort file in bin/",
                language,
                version
            ),
            InstallEvent::SmokeTestPassed { executable } => {
                log::info!("Smoke test passed for {}", executable.display())
            }
            InstallEvent::SmokeTestTimedOut {
                executable,
                timeout,
            } => log::warn!(
                "Smoke test of {} timed out after {:?}; process killed",
                executable.display(),
                timeout
            ),
            InstallEvent::SmokeTestFailed {
                executable,
                exit_code,
                stderr,
            } => log::warn!(
                "Smoke test of {} exited with {}: {}",
                executable.display(),
                exit_code.map_or_else(|| "no exit code".to_string(), |c| c.to_string()),
                stderr.trim()
            ),
            InstallEvent::SmokeTestSkipped { reason } => {
                log::warn!("Smoke test skipped: {}", reason)
            }
            InstallEvent::KnownBadVersion { language, version } => log::warn!(
                "{} {} is a known-bad version; consider pinning another release",
                language,
                version
            ),
        }
    }
}

/// Keeps every event in memory. Useful for tests and for callers that
/// want to render progress themselves.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<InstallEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InstallEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl InstallObserver for RecordingObserver {
    fn on_event(&self, event: &InstallEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
