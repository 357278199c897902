//! The `pgbouncer-cli` console shortcut.

use std::path::Path;

use crate::files::{self, ArtifactError};

/// Shell script opening the admin console on `listen_port`.
pub fn console_script(listen_port: u16) -> String {
    format!(
        "#!/bin/sh\n\
         export LC_ALL=en_US.UTF-8\n\
         exec psql -h localhost -p {listen_port} pgbouncer\n"
    )
}

/// Write the script (mode 0555) if its content changed.
///
/// Returns `true` when the file was rewritten.
pub fn write_console_script(path: &Path, listen_port: u16) -> Result<bool, ArtifactError> {
    let written = files::write_if_changed(path, console_script(listen_port).as_bytes(), 0o555)?;
    if written {
        tracing::info!(path = %path.display(), listen_port, "Wrote console shortcut");
    }
    Ok(written)
}
