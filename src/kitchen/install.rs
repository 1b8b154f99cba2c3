// src/kitchen/install.rs

//! Placing built artifacts into the installation prefix

use crate::error::{Error, Result};
use crate::formula::{ArtifactMode, ArtifactSpec};
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// One file written into the prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledFile {
    /// Absolute path of the installed file
    pub path: PathBuf,
    /// Declared mode
    pub mode: ArtifactMode,
}

/// Everything an install placed under the prefix
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstalledArtifacts {
    pub prefix: PathBuf,
    pub files: Vec<InstalledFile>,
}

/// Check that an install destination stays inside the prefix
///
/// Returns the normalized relative path. Absolute paths and paths with
/// `..` components are rejected.
pub fn check_destination(dest: &str) -> Result<PathBuf> {
    let path = Path::new(dest);
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::InstallError(format!(
                    "destination '{}' escapes the installation prefix",
                    dest
                )));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InstallError(format!(
            "destination '{}' does not name a file",
            dest
        )));
    }

    Ok(normalized)
}

/// Copy artifacts from the build workdir into `prefix`
///
/// Every destination is checked before anything is written, so a bad destination
/// leaves the prefix untouched.
pub fn install_artifacts(
    workdir: &Path,
    prefix: &Path,
    specs: &[ArtifactSpec],
) -> Result<InstalledArtifacts> {
    let mut plan = Vec::with_capacity(specs.len());
    for spec in specs {
        let relative = check_destination(&spec.dest)?;
        let source = workdir.join(&spec.path);
        if !source.is_file() {
            return Err(Error::InstallError(format!(
                "build did not produce {}",
                source.display()
            )));
        }
        plan.push((source, prefix.join(relative), spec.mode));
    }

    let mut installed = InstalledArtifacts {
        prefix: prefix.to_path_buf(),
        files: Vec::with_capacity(plan.len()),
    };

    for (source, target, mode) in plan {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::InstallError(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        fs::copy(&source, &target).map_err(|e| {
            Error::InstallError(format!(
                "Failed to copy {} to {}: {}",
                source.display(),
                target.display(),
                e
            ))
        })?;
        set_mode(&target, mode)?;

        debug!("Installed {} ({})", target.display(), mode);
        installed.files.push(InstalledFile { path: target, mode });
    }

    info!("Installed {} files into {}", installed.files.len(), prefix.display());
    Ok(installed)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: ArtifactMode) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode.permissions())).map_err(|e| {
        Error::InstallError(format!("Failed to set mode on {}: {}", path.display(), e))
    })
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: ArtifactMode) -> Result<()> {
    Ok(())
}
