//! Post-install version probe

use crate::errors::{RalenError, RalenResult};
use crate::installation::events::{InstallEvent, InstallObserver};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

pub const DEFAULT_SMOKE_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmokeOutcome {
    Passed,
    TimedOut,
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },
}

impl SmokeOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, SmokeOutcome::Passed)
    }
}

/// Runs `<runtime> <version-arg>` with a deadline. A failing or hanging
/// runtime is reported to the observer, never returned as an error.
#[derive(Debug, Clone)]
pub struct SmokeTester {
    timeout: Duration,
}

impl Default for SmokeTester {
    fn default() -> Self {
        Self::new()
    }
}

impl SmokeTester {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_SMOKE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run(
        &self,
        runtime: &Path,
        version_arg: &str,
        observer: &dyn InstallObserver,
    ) -> RalenResult<SmokeOutcome> {
        let mut command = Command::new(runtime);
        if !version_arg.is_empty() {
            command.arg(version_arg);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| RalenError::ProcessLaunch {
            path: runtime.to_path_buf(),
            reason: e.to_string(),
        })?;

        // On timeout the child is dropped with the future, and kill_on_drop kills it
        let outcome = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Err(_) => {
                observer.on_event(&InstallEvent::SmokeTestTimedOut {
                    executable: runtime.to_path_buf(),
                    timeout: self.timeout,
                });
                SmokeOutcome::TimedOut
            }
            Ok(Err(e)) => {
                return Err(RalenError::ProcessLaunch {
                    path: runtime.to_path_buf(),
                    reason: format!("failed waiting for process: {}", e),
                })
            }
            Ok(Ok(output)) if output.status.success() => {
                observer.on_event(&InstallEvent::SmokeTestPassed {
                    executable: runtime.to_path_buf(),
                });
                SmokeOutcome::Passed
            }
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                observer.on_event(&InstallEvent::SmokeTestFailed {
                    executable: runtime.to_path_buf(),
                    exit_code: output.status.code(),
                    stderr: stderr.clone(),
                });
                SmokeOutcome::Failed {
                    exit_code: output.status.code(),
                    stderr,
                }
            }
        };

        Ok(outcome)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::installation::events::RecordingObserver;
    use crate::test_utils::fixtures::write_script;
    use serial_test::serial;
    use std::time::Instant;
    use tempfile::TempDir;

    #[tokio::test]
    #[serial]
    async fn passing_runtime() {
        let dir = TempDir::new().unwrap();
        let runtime = write_script(dir.path(), "salang", "[ \"$1\" = \"--version\" ] && echo 1.2.0");
        let observer = RecordingObserver::new();

        let outcome = SmokeTester::new().run(&runtime, "--version", &observer).await.unwrap();

        assert_eq!(outcome, SmokeOutcome::Passed);
        assert!(observer.events().iter().all(|e| !e.is_warning()));
    }

    #[tokio::test]
    #[serial]
    async fn nonzero_exit_is_reported_with_stderr() {
        let dir = TempDir::new().unwrap();
        let runtime = write_script(dir.path(), "salang", "echo 'unknown flag' >&2\nexit 3");
        let observer = RecordingObserver::new();

        let outcome = SmokeTester::new().run(&runtime, "--version", &observer).await.unwrap();

        match outcome {
            SmokeOutcome::Failed { exit_code, stderr } => {
                assert_eq!(exit_code, Some(3));
                assert!(stderr.contains("unknown flag"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(matches!(
            observer.events().as_slice(),
            [InstallEvent::SmokeTestFailed { exit_code: Some(3), .. }]
        ));
    }

    #[tokio::test]
    #[serial]
    async fn hanging_runtime_is_killed() {
        let dir = TempDir::new().unwrap();
        let runtime = write_script(dir.path(), "salang", "exec sleep 30");
        let observer = RecordingObserver::new();
        let tester = SmokeTester::new().with_timeout(Duration::from_millis(500));

        let started = Instant::now();
        let outcome = tester.run(&runtime, "--version", &observer).await.unwrap();

        assert_eq!(outcome, SmokeOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(observer.events()[0].is_warning());
    }

    #[tokio::test]
    async fn missing_runtime_cannot_start() {
        let dir = TempDir::new().unwrap();
        let observer = RecordingObserver::new();

        let err = SmokeTester::new()
            .run(&dir.path().join("nope"), "--version", &observer)
            .await
            .unwrap_err();

        assert!(matches!(err, RalenError::ProcessLaunch { .. }));
    }

    #[test]
    fn default_timeout_is_eight_seconds() {
        assert_eq!(SmokeTester::new().timeout(), Duration::from_secs(8));
    }
}
