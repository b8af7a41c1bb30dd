//! Puts the `ralen` command on the user's PATH.
//!
//! A shim (symlink, or a wrapper script when symlinks are unavailable) is
//! placed in a per-user bin directory, and that directory is exported from
//! `~/.profile` and `~/.bashrc` under a `# ralen` marker line. Both steps are
//! idempotent and [`PathConfigurator::remove`] undoes them.

use crate::errors::{RalenError, RalenResult};
use crate::installation::types::Platform;
use std::fs;
use std::path::{Path, PathBuf};

pub const PROFILE_MARKER: &str = "# ralen";
const WRAPPER_MARKER: &str = "# ralen shim";
const PROFILE_FILES: [&str; 2] = [".profile", ".bashrc"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShimKind {
    Symlink,
    WrapperScript,
    WindowsCmd,
}

#[derive(Debug, Clone, Default)]
pub struct PathReport {
    pub shim_dir: PathBuf,
    pub shim: Option<(PathBuf, ShimKind)>,
    pub profiles_updated: Vec<PathBuf>,
}

impl PathReport {
    pub fn changed(&self) -> bool {
        self.shim.is_some() || !self.profiles_updated.is_empty()
    }
}

pub struct PathConfigurator {
    home: PathBuf,
    executable: Option<PathBuf>,
    platform: Platform,
}

impl PathConfigurator {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            executable: std::env::current_exe().ok(),
            platform: Platform::current(),
        }
    }

    /// Configurator for the current user's home directory
    pub fn for_current_user() -> RalenResult<Self> {
        let home = dirs::home_dir().ok_or_else(|| RalenError::Config {
            message: "could not determine the home directory".to_string(),
        })?;
        Ok(Self::new(home))
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    fn shim_name(&self) -> &'static str {
        if self.platform.is_windows() {
            "ralen.cmd"
        } else {
            "ralen"
        }
    }

    /// First usable per-user bin directory, created if needed
    pub fn shim_dir(&self) -> RalenResult<PathBuf> {
        let candidates = if self.platform.is_windows() {
            vec![self.home.join(".ralen").join("bin")]
        } else {
            vec![
                self.home.join(".local").join("bin"),
                self.home.join("bin"),
                self.home.join(".ralen").join("bin"),
            ]
        };

        for dir in &candidates {
            if dir.is_dir() || fs::create_dir_all(dir).is_ok() {
                return Ok(dir.clone());
            }
        }
        Err(RalenError::Config {
            message: format!("no writable bin directory under {}", self.home.display()),
        })
    }

    pub fn configure(&self, create_shim: bool) -> RalenResult<PathReport> {
        let shim_dir = self.shim_dir()?;
        let mut report = PathReport {
            shim_dir: shim_dir.clone(),
            ..Default::default()
        };

        if create_shim {
            match &self.executable {
                Some(exe) if exe.is_file() => {
                    let shim = shim_dir.join(self.shim_name());
                    if self.shim_is_current(exe, &shim) {
                        log::debug!("Shim {} already points at {}", shim.display(), exe.display());
                    } else {
                        let kind = self.write_shim(exe, &shim)?;
                        log::info!("Created shim {} -> {}", shim.display(), exe.display());
                        report.shim = Some((shim, kind));
                    }
                }
                _ => log::warn!("Current executable not found; skipping shim creation"),
            }
        }

        if self.platform.is_windows() {
            log::info!("Add {} to your user PATH to use the shim", shim_dir.display());
            return Ok(report);
        }

        let export_line = export_line(&shim_dir);
        for file in PROFILE_FILES {
            let profile = self.home.join(file);
            if add_export(&profile, &export_line)? {
                report.profiles_updated.push(profile);
            }
        }
        Ok(report)
    }

    pub fn remove(&self, remove_shim: bool) -> RalenResult<PathReport> {
        let mut report = PathReport::default();

        for file in PROFILE_FILES {
            let profile = self.home.join(file);
            if strip_export(&profile)? {
                report.profiles_updated.push(profile);
            }
        }

        if remove_shim {
            let shim_dir = self.shim_dir()?;
            let shim = shim_dir.join(self.shim_name());
            if let Some(kind) = shim_kind(&shim) {
                fs::remove_file(&shim)?;
                log::info!("Removed shim {}", shim.display());
                report.shim = Some((shim, kind));
            }
            report.shim_dir = shim_dir;
        }
        Ok(report)
    }

    fn windows_script(exe: &Path) -> String {
        format!("@echo off\r\n\"{}\" %*\r\n", exe.display())
    }

    fn wrapper_script(exe: &Path) -> String {
        format!("#!/bin/sh\n{}\nexec \"{}\" \"$@\"\n", WRAPPER_MARKER, exe.display())
    }

    /// Whether `shim` already forwards to `exe`
    fn shim_is_current(&self, exe: &Path, shim: &Path) -> bool {
        if fs::read_link(shim).is_ok_and(|target| target == exe) {
            return true;
        }
        let expected = if self.platform.is_windows() {
            Self::windows_script(exe)
        } else {
            Self::wrapper_script(exe)
        };
        fs::read_to_string(shim).is_ok_and(|content| content == expected)
            && fs::symlink_metadata(shim).is_ok_and(|m| m.file_type().is_file())
    }

    fn write_shim(&self, exe: &Path, shim: &Path) -> RalenResult<ShimKind> {
        if fs::symlink_metadata(shim).is_ok() {
            fs::remove_file(shim)?;
        }

        if self.platform.is_windows() {
            fs::write(shim, Self::windows_script(exe))?;
            return Ok(ShimKind::WindowsCmd);
        }

        #[cfg(unix)]
        if std::os::unix::fs::symlink(exe, shim).is_ok() {
            return Ok(ShimKind::Symlink);
        }

        fs::write(shim, Self::wrapper_script(exe))?;
        crate::installation::archive::make_executable(shim)?;
        Ok(ShimKind::WrapperScript)
    }
}

fn export_line(dir: &Path) -> String {
    format!("export PATH=\"{}:$PATH\"", dir.display())
}

/// Append the marker and export line unless already present
fn add_export(profile: &Path, line: &str) -> RalenResult<bool> {
    let content = match fs::read_to_string(profile) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    if content.lines().any(|l| l.trim() == line) {
        return Ok(false);
    }

    let mut updated = content;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(&format!("\n{}\n{}\n", PROFILE_MARKER, line));
    fs::write(profile, updated)?;
    Ok(true)
}

/// Drop every marker line and the export line following it
fn strip_export(profile: &Path) -> RalenResult<bool> {
    let content = match fs::read_to_string(profile) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    let mut kept: Vec<&str> = Vec::new();
    let mut removed = false;
    let mut lines = content.lines().peekable();
    while let Some(line) = lines.next() {
        if line.trim() == PROFILE_MARKER {
            if let Some(next) = lines.peek() {
                if next.trim_start().starts_with("export PATH=") {
                    lines.next();
                }
            }
            if kept.last().is_some_and(|l| l.trim().is_empty()) {
                kept.pop();
            }
            removed = true;
            continue;
        }
        kept.push(line);
    }

    if removed {
        let mut updated = kept.join("\n");
        if !updated.is_empty() {
            updated.push('\n');
        }
        fs::write(profile, updated)?;
    }
    Ok(removed)
}

/// Recognize only shims this module could have written
fn shim_kind(shim: &Path) -> Option<ShimKind> {
    let meta = fs::symlink_metadata(shim).ok()?;
    if meta.file_type().is_symlink() {
        return Some(ShimKind::Symlink);
    }
    let content = fs::read_to_string(shim).ok()?;
    if content.contains(WRAPPER_MARKER) {
        Some(ShimKind::WrapperScript)
    } else if content.starts_with("@echo off") {
        Some(ShimKind::WindowsCmd)
    } else {
        None
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn configurator(home: &TempDir) -> PathConfigurator {
        let exe = home.path().join("opt").join("ralen");
        fs::create_dir_all(exe.parent().unwrap()).unwrap();
        fs::write(&exe, "#!/bin/sh\n").unwrap();
        PathConfigurator::new(home.path())
            .with_executable(exe)
            .with_platform(Platform {
                os: "linux".to_string(),
            })
    }

    #[test]
    fn configure_is_idempotent() {
        let home = TempDir::new().unwrap();
        fs::write(home.path().join(".bashrc"), "alias ll='ls -l'").unwrap();
        let configurator = configurator(&home);

        let first = configurator.configure(true).unwrap();
        let second = configurator.configure(true).unwrap();

        let bin = home.path().join(".local").join("bin");
        assert_eq!(first.shim_dir, bin);
        assert_eq!(first.profiles_updated.len(), 2);
        assert!(second.profiles_updated.is_empty());
        assert!(second.shim.is_none());
        assert!(!second.changed());

        let bashrc = fs::read_to_string(home.path().join(".bashrc")).unwrap();
        assert!(bashrc.starts_with("alias ll='ls -l'\n"));
        let export = format!("export PATH=\"{}:$PATH\"", bin.display());
        assert_eq!(bashrc.matches(&export).count(), 1);
        assert!(bashrc.contains(PROFILE_MARKER));

        let (shim, kind) = first.shim.unwrap();
        assert_eq!(shim, bin.join("ralen"));
        assert_eq!(kind, ShimKind::Symlink);
        assert_eq!(fs::read_link(&shim).unwrap(), home.path().join("opt").join("ralen"));
    }

    #[test]
    fn stale_shim_is_repointed() {
        let home = TempDir::new().unwrap();
        let configurator = configurator(&home);
        let bin = home.path().join(".local").join("bin");
        fs::create_dir_all(&bin).unwrap();
        let old_exe = home.path().join("old-ralen");
        fs::write(&old_exe, "#!/bin/sh\n").unwrap();
        std::os::unix::fs::symlink(&old_exe, bin.join("ralen")).unwrap();

        let report = configurator.configure(true).unwrap();

        assert!(report.shim.is_some());
        assert_eq!(fs::read_link(bin.join("ralen")).unwrap(), home.path().join("opt").join("ralen"));
    }

    #[test]
    fn remove_restores_profiles() {
        let home = TempDir::new().unwrap();
        fs::write(home.path().join(".profile"), "umask 022\n").unwrap();
        let configurator = configurator(&home);

        configurator.configure(true).unwrap();
        let report = configurator.remove(true).unwrap();

        assert_eq!(report.profiles_updated.len(), 2);
        assert!(matches!(report.shim, Some((_, ShimKind::Symlink))));
        assert_eq!(fs::read_to_string(home.path().join(".profile")).unwrap(), "umask 022\n");
        assert_eq!(fs::read_to_string(home.path().join(".bashrc")).unwrap(), "");
        assert!(!home.path().join(".local").join("bin").join("ralen").exists());

        let again = configurator.remove(true).unwrap();
        assert!(!again.changed());
    }

    #[test]
    fn foreign_binary_is_never_removed() {
        let home = TempDir::new().unwrap();
        let bin = home.path().join(".local").join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("ralen"), "#!/bin/sh\necho someone else\n").unwrap();

        let report = configurator(&home).remove(true).unwrap();

        assert!(report.shim.is_none());
        assert!(bin.join("ralen").exists());
    }

    #[test]
    fn configure_without_shim_only_touches_profiles() {
        let home = TempDir::new().unwrap();

        let report = configurator(&home).configure(false).unwrap();

        assert!(report.shim.is_none());
        assert_eq!(report.profiles_updated.len(), 2);
        assert!(!report.shim_dir.join("ralen").exists());
    }
}
