//! `.pgpass` files for administrative users.

use std::path::PathBuf;

use crate::config::AdminUser;
use crate::files::{self, ArtifactError};

use super::secret::SecureString;

/// Contents of an administrative user's `.pgpass`.
pub fn pgpass_contents(user: &str, password: &SecureString) -> String {
    format!(
        "# This file is maintained by poolctl\n*:*:*:{}:{}\n",
        user,
        password.expose()
    )
}

/// Write `~user/.pgpass` (mode 0600) if the home directory exists.
///
/// Returns the path when the file was (re)written. The file is handed to
/// the owner of the home directory.
pub fn write_pgpass(
    user: &AdminUser,
    password: &SecureString,
) -> Result<Option<PathBuf>, ArtifactError> {
    if !user.home.is_dir() {
        return Ok(None);
    }

    let path = user.home.join(".pgpass");
    let contents = pgpass_contents(&user.name, password);
    if !files::write_if_changed(&path, contents.as_bytes(), 0o600)? {
        return Ok(None);
    }

    give_to_home_owner(user, &path);
    tracing::info!(user = %user.name, path = %path.display(), "Wrote .pgpass");
    Ok(Some(path))
}

#[cfg(unix)]
fn give_to_home_owner(user: &AdminUser, path: &std::path::Path) {
    use std::os::unix::fs::MetadataExt;

    let (Ok(home), Ok(file)) = (std::fs::metadata(&user.home), std::fs::metadata(path)) else {
        return;
    };
    if home.uid() == file.uid() && home.gid() == file.gid() {
        return;
    }
    if let Err(e) = std::os::unix::fs::chown(path, Some(home.uid()), Some(home.gid())) {
        tracing::warn!(user = %user.name, error = %e, "Failed to chown .pgpass");
    }
}

#[cfg(not(unix))]
fn give_to_home_owner(_user: &AdminUser, _path: &std::path::Path) {}
