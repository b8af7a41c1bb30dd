//! Error types shared by every ralen component.
//!
//! Every fatal condition in the install and run pipelines is a variant of
//! [`RalenError`]. Non-fatal conditions (smoke-test failures, known-bad
//! versions) are never errors; they travel as
//! [`InstallEvent`](crate::installation::events::InstallEvent)s instead.
//!
//! The command boundary maps errors onto process exit codes with
//! [`RalenError::exit_code`]: `1` for mistakes the user can fix by changing
//! the invocation, `2` for everything else.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving, installing or running a runtime
#[derive(Error, Debug)]
pub enum RalenError {
    #[error("Unknown language '{language}'")]
    UnknownLanguage { language: String },

    #[error("No repository configured for language '{language}'")]
    NoRepository { language: String },

    #[error("No release found for {owner}/{repo} matching '{version}'")]
    ReleaseNotFound {
        owner: String,
        repo: String,
        version: String,
    },

    #[error("Release '{tag}' of {owner}/{repo} has no downloadable asset or archive")]
    NoDownloadableAsset {
        owner: String,
        repo: String,
        tag: String,
    },

    #[error("{}", transport_message(.url, .status, .reason))]
    Transport {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("Failed to extract {}: {reason}", .path.display())]
    Extraction { path: PathBuf, reason: String },

    #[error("Runtime for {language} {version} reported installed but {} is missing", .path.display())]
    RuntimeInconsistency {
        language: String,
        version: String,
        path: PathBuf,
    },

    #[error("Multiple project files found in {}; pass one explicitly with --project <file>:\n{}", .directory.display(), list_paths(.candidates))]
    AmbiguousProject {
        directory: PathBuf,
        candidates: Vec<PathBuf>,
    },

    #[error("Project not found: {message}")]
    ProjectNotFound { message: String },

    #[error("Invalid project file {}: {reason}", .path.display())]
    InvalidProject { path: PathBuf, reason: String },

    #[error("Package '{name}' is not installed")]
    PackageNotFound { name: String },

    #[error("Failed to start {}: {reason}", .path.display())]
    ProcessLaunch { path: PathBuf, reason: String },

    #[error("Failed to ensure {language} runtime is installed: {source}")]
    EnsureFailed {
        language: String,
        #[source]
        source: Box<RalenError>,
    },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },
}

fn transport_message(url: &str, status: &Option<u16>, reason: &str) -> String {
    match status {
        Some(code) => format!("Request to {} failed with HTTP {}: {}", url, code, reason),
        None => format!("Request to {} failed: {}", url, reason),
    }
}

fn list_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .enumerate()
        .map(|(i, p)| format!("  [{}] {}", i, p.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

impl RalenError {
    /// Whether the user can fix this by changing the invocation
    pub fn is_user_error(&self) -> bool {
        match self {
            RalenError::UnknownLanguage { .. }
            | RalenError::NoRepository { .. }
            | RalenError::AmbiguousProject { .. }
            | RalenError::ProjectNotFound { .. }
            | RalenError::InvalidProject { .. }
            | RalenError::PackageNotFound { .. }
            | RalenError::InvalidArgument { .. } => true,
            RalenError::EnsureFailed { source, .. } => source.is_user_error(),
            _ => false,
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_user_error() {
            1
        } else {
            2
        }
    }

    /// Follow-up hints printed under the error message
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            RalenError::UnknownLanguage { .. } => {
                vec!["Run `ralen list-known` to see the supported languages.".to_string()]
            }
            RalenError::NoRepository { language } => vec![format!(
                "Pass a repository explicitly: `ralen install {} latest --repo owner/repo`.",
                language
            )],
            RalenError::ReleaseNotFound { owner, repo, .. } => vec![
                format!("Check that https://github.com/{}/{} exists and has releases.", owner, repo),
                "Try another tag, or `--repo owner/repo` to point at a fork.".to_string(),
            ],
            RalenError::NoDownloadableAsset { tag, .. } => vec![
                "Try `--repo owner/repo` to use a repository that publishes binaries.".to_string(),
                format!(
                    "Or place the runtime manually under <install-dir>/versions/<language>/{}/bin/.",
                    tag
                ),
            ],
            RalenError::EnsureFailed { source, .. } => source.suggestions(),
            _ => Vec::new(),
        }
    }
}

impl From<std::io::Error> for RalenError {
    fn from(err: std::io::Error) -> Self {
        RalenError::Io {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for RalenError {
    fn from(err: reqwest::Error) -> Self {
        RalenError::Transport {
            url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            status: err.status().map(|s| s.as_u16()),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for RalenError {
    fn from(err: serde_json::Error) -> Self {
        RalenError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type for ralen operations
pub type RalenResult<T> = Result<T, RalenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_exit_with_one() {
        let err = RalenError::UnknownLanguage {
            language: "cobol".to_string(),
        };
        assert_eq!(err.exit_code(), 1);

        let err = RalenError::Transport {
            url: "https://example.invalid/x".to_string(),
            status: Some(503),
            reason: "Service Unavailable".to_string(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn ensure_failed_takes_exit_code_from_source() {
        let err = RalenError::EnsureFailed {
            language: "salang".to_string(),
            source: Box::new(RalenError::NoRepository {
                language: "salang".to_string(),
            }),
        };
        assert_eq!(err.exit_code(), 1);
        assert!(!err.suggestions().is_empty());
    }

    #[test]
    fn transport_message_includes_status() {
        let err = RalenError::Transport {
            url: "https://example.invalid/SaLang".to_string(),
            status: Some(404),
            reason: "Not Found".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("HTTP 404"));
        assert!(message.contains("https://example.invalid/SaLang"));
    }

    #[test]
    fn ambiguous_project_lists_candidates() {
        let err = RalenError::AmbiguousProject {
            directory: PathBuf::from("/work"),
            candidates: vec![PathBuf::from("/work/a.ralenproj"), PathBuf::from("/work/b.ralenproj")],
        };
        let message = err.to_string();
        assert!(message.contains("[0] /work/a.ralenproj"));
        assert!(message.contains("[1] /work/b.ralenproj"));
        assert!(message.contains("--project"));
    }
}
