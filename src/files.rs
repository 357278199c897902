//! Whole-file artifact writes.
//!
//! Every generated file is rewritten wholesale: the new bytes go to a
//! sibling temp file which is renamed over the target, so readers never see
//! a partial file and read-only targets (mode 0400) can still be replaced.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors reading or writing generated artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is not valid JSON: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read a file, treating a missing file as `None`.
pub fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, ArtifactError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ArtifactError::Read {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Replace `path` with `contents` unless it already holds exactly those bytes.
///
/// Returns `true` when the file was written.
pub fn write_if_changed(path: &Path, contents: &[u8], mode: u32) -> Result<bool, ArtifactError> {
    if read_optional(path)?.as_deref() == Some(contents) {
        return Ok(false);
    }
    write_atomic(path, contents, mode)?;
    Ok(true)
}

/// Write `contents` to `path` through a temp file and rename.
pub fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<(), ArtifactError> {
    let write_err = |source| ArtifactError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    fs::write(&tmp, contents).map_err(write_err)?;
    set_mode(&tmp, mode).map_err(write_err)?;
    fs::rename(&tmp, path).map_err(write_err)?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
