//! Unpacking downloaded artifacts into the canonical `<versionDir>/bin/<runtime>` layout.
//!
//! Everything here is blocking filesystem work; async callers run it on
//! `tokio::task::spawn_blocking`.

use crate::catalog::LanguageDefinition;
use crate::errors::{RalenError, RalenResult};
use crate::installation::types::Platform;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Archive(ArchiveFormat),
    SingleFile,
}

/// Decide how to treat a download from its file name and first bytes.
/// Servers often omit extensions, so the signature is checked as well.
pub fn classify_artifact(file_name: &str, leading: &[u8]) -> ArtifactKind {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".zip") || leading.starts_with(b"PK") {
        ArtifactKind::Archive(ArchiveFormat::Zip)
    } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") || leading.starts_with(&[0x1f, 0x8b]) {
        ArtifactKind::Archive(ArchiveFormat::TarGz)
    } else {
        ArtifactKind::SingleFile
    }
}

/// Where the runtime ended up after [`ArchiveInstaller::install`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    pub bin_dir: PathBuf,
    /// The canonical runtime, or the best-effort file when nothing matched
    pub executable: Option<PathBuf>,
    /// Whether `executable` matched one of the language's runtime names
    pub recognized: bool,
}

#[derive(Debug, Clone)]
pub struct ArchiveInstaller {
    platform: Platform,
}

impl Default for ArchiveInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveInstaller {
    pub fn new() -> Self {
        Self {
            platform: Platform::current(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Install `artifact` into `target_dir`, which must be empty.
    pub fn install(
        &self,
        artifact: &Path,
        target_dir: &Path,
        definition: &LanguageDefinition,
    ) -> RalenResult<InstallLayout> {
        self.install_inner(artifact, target_dir, definition)
            .map_err(|e| match e {
                err @ RalenError::Extraction { .. } => err,
                other => RalenError::Extraction {
                    path: artifact.to_path_buf(),
                    reason: other.to_string(),
                },
            })
    }

    fn install_inner(
        &self,
        artifact: &Path,
        target_dir: &Path,
        definition: &LanguageDefinition,
    ) -> RalenResult<InstallLayout> {
        let file_name = artifact
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let kind = classify_artifact(file_name, &read_signature(artifact)?);
        log::debug!("Installing {} as {:?}", artifact.display(), kind);

        fs::create_dir_all(target_dir)?;
        let layout = match kind {
            ArtifactKind::Archive(format) => {
                match format {
                    ArchiveFormat::Zip => extract_zip(artifact, target_dir)?,
                    ArchiveFormat::TarGz => extract_tar_gz(artifact, target_dir)?,
                }
                if flatten_single_wrapper(target_dir)? {
                    log::debug!("Flattened wrapper directory in {}", target_dir.display());
                }
                self.collect_runtime(target_dir, definition)?
            }
            ArtifactKind::SingleFile => {
                let bin_dir = target_dir.join("bin");
                fs::create_dir_all(&bin_dir)?;
                let destination = bin_dir.join(definition.canonical_executable_name());
                move_file(artifact, &destination)?;
                InstallLayout {
                    bin_dir,
                    executable: Some(destination),
                    recognized: true,
                }
            }
        };

        if let Some(executable) = &layout.executable {
            make_executable(executable)?;
        }
        Ok(layout)
    }

    /// Move every recognized runtime file into `bin/` and give the preferred
    /// one the canonical name.
    fn collect_runtime(&self, root: &Path, definition: &LanguageDefinition) -> RalenResult<InstallLayout> {
        let bin_dir = root.join("bin");

        let mut matches: Vec<PathBuf> = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| definition.is_runtime_name(name))
            })
            .map(|entry| entry.into_path())
            .collect();

        fs::create_dir_all(&bin_dir)?;

        if matches.is_empty() {
            let fallback = first_root_file(root)?;
            let executable = match fallback {
                Some(file) => {
                    let destination = bin_dir.join(file.file_name().unwrap_or_default());
                    move_file(&file, &destination)?;
                    Some(destination)
                }
                None => None,
            };
            return Ok(InstallLayout {
                bin_dir,
                executable,
                recognized: false,
            });
        }

        matches.sort_by_key(|path| self.preference(path, definition));

        let mut in_bin = Vec::with_capacity(matches.len());
        for path in matches {
            let Some(name) = path.file_name() else { continue };
            let destination = bin_dir.join(name);
            if path.parent() == Some(bin_dir.as_path()) {
                in_bin.push(destination);
            } else if destination.exists() {
                log::debug!("Skipping duplicate runtime {}", path.display());
            } else {
                move_file(&path, &destination)?;
                in_bin.push(destination);
            }
        }

        let Some(primary) = in_bin.into_iter().next() else {
            return Ok(InstallLayout {
                bin_dir,
                executable: None,
                recognized: false,
            });
        };

        let canonical = bin_dir.join(definition.canonical_executable_name());
        if primary != canonical {
            fs::rename(&primary, &canonical)?;
        }

        Ok(InstallLayout {
            bin_dir,
            executable: Some(canonical),
            recognized: true,
        })
    }

    /// Sort key: `.exe` first on Windows, then catalog order, then shallowest path
    fn preference(&self, path: &Path, definition: &LanguageDefinition) -> (bool, usize, usize) {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let wrong_extension =
            self.platform.is_windows() && !name.to_ascii_lowercase().ends_with(".exe");
        let rank = definition
            .runtime_executables
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(name))
            .unwrap_or(usize::MAX);
        (wrong_extension, rank, path.components().count())
    }
}

fn read_signature(path: &Path) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(4);
    fs::File::open(path)?.take(4).read_to_end(&mut buffer)?;
    Ok(buffer)
}

fn extract_zip(archive_path: &Path, target_dir: &Path) -> RalenResult<()> {
    let extraction_error = |reason: String| RalenError::Extraction {
        path: archive_path.to_path_buf(),
        reason,
    };

    let file = fs::File::open(archive_path)?;
    let mut archive =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|e| extraction_error(e.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| extraction_error(e.to_string()))?;

        let Some(relative) = entry.enclosed_name() else {
            log::warn!("Skipping archive entry outside the target: {}", entry.name());
            continue;
        };
        let out_path = target_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out_file = fs::File::create(&out_path)?;
        io::copy(&mut entry, &mut out_file)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777))?;
        }
    }

    Ok(())
}

fn extract_tar_gz(archive_path: &Path, target_dir: &Path) -> RalenResult<()> {
    let file = fs::File::open(archive_path)?;
    let decoder = flate2::read::GzDecoder::new(BufReader::new(file));
    let mut archive = tar::Archive::new(decoder);

    let entries = archive.entries().map_err(|e| RalenError::Extraction {
        path: archive_path.to_path_buf(),
        reason: e.to_string(),
    })?;
    for entry in entries {
        let mut entry = entry.map_err(|e| RalenError::Extraction {
            path: archive_path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if entry.header().entry_type() == tar::EntryType::XGlobalHeader {
            continue;
        }
        // unpack_in refuses paths that escape target_dir
        if !entry.unpack_in(target_dir)? {
            log::warn!("Skipping archive entry outside the target: {}", entry.path()?.display());
        }
    }

    Ok(())
}

/// Branch and tag archives wrap everything in one `<repo>-<ref>/` directory.
/// Move its contents up a level and drop it. A lone `bin/` is left alone.
fn flatten_single_wrapper(target_dir: &Path) -> io::Result<bool> {
    let entries = fs::read_dir(target_dir)?.collect::<io::Result<Vec<_>>>()?;
    if entries.len() != 1 || !entries[0].file_type()?.is_dir() || entries[0].file_name() == "bin" {
        return Ok(false);
    }

    // Rename first so a child sharing the wrapper's name cannot collide with it
    let staging = target_dir.join(format!(".ralen-unwrap-{}", uuid::Uuid::new_v4().simple()));
    fs::rename(entries[0].path(), &staging)?;
    for child in fs::read_dir(&staging)? {
        let child = child?;
        fs::rename(child.path(), target_dir.join(child.file_name()))?;
    }
    fs::remove_dir(&staging)?;
    Ok(true)
}

fn first_root_file(root: &Path) -> io::Result<Option<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files.into_iter().next())
}

/// Rename, falling back to copy + delete across filesystems
pub(crate) fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

#[cfg(unix)]
pub(crate) fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
pub(crate) fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Hex SHA-256 of a file
pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(fs::File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}
