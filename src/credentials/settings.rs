//! Leader settings: the replicated key/value store only the leader writes.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::Mutex;

use super::CredentialError;

/// Replicated key/value store with a single designated writer.
///
/// Every unit can read. Callers must only `set` when they hold leadership;
/// the store itself does not arbitrate.
pub trait LeaderSettings {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError>;

    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError>;
}

/// In-process settings. Clones share the same data, which models every
/// unit reading one replicated copy.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    inner: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeaderSettings for MemorySettings {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.inner.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.inner.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Settings persisted as a JSON object on disk.
///
/// Writes take an exclusive `flock` for the read-modify-write cycle.
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> CredentialError {
        CredentialError::Settings {
            path: self.path.clone(),
            source,
        }
    }

    fn decode(&self, content: &str) -> Result<BTreeMap<String, String>, CredentialError> {
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(content).map_err(|e| CredentialError::SettingsFormat {
            path: self.path.clone(),
            source: e,
        })
    }

    fn read_locked(&self, file: &mut File) -> Result<BTreeMap<String, String>, CredentialError> {
        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| self.io_err(e))?;
        self.decode(&content)
    }
}

impl LeaderSettings for SettingsFile {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };
        file.lock_shared().map_err(|e| self.io_err(e))?;
        let result = self.read_locked(&mut file);
        let _ = FileExt::unlock(&file);
        Ok(result?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        file.lock_exclusive().map_err(|e| self.io_err(e))?;

        let result = (|| {
            let mut values = self.read_locked(&mut file)?;
            values.insert(key.to_string(), value.to_string());
            let encoded = serde_json::to_string_pretty(&values).map_err(|e| {
                CredentialError::SettingsFormat {
                    path: self.path.clone(),
                    source: e,
                }
            })?;
            file.set_len(0).map_err(|e| self.io_err(e))?;
            file.seek(SeekFrom::Start(0)).map_err(|e| self.io_err(e))?;
            file.write_all(encoded.as_bytes())
                .map_err(|e| self.io_err(e))?;
            file.sync_all().map_err(|e| self.io_err(e))
        })();

        let _ = FileExt::unlock(&file);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_clones_share_state() {
        let leader = MemorySettings::new();
        let follower = leader.clone();
        leader.set("userlist", "\"a\" \"b\"\n").unwrap();
        assert_eq!(
            follower.get("userlist").unwrap().as_deref(),
            Some("\"a\" \"b\"\n")
        );
    }

    #[test]
    fn file_round_trips_values() {
        let dir = TempDir::new().unwrap();
        let settings = SettingsFile::new(dir.path().join("leader.json"));

        assert!(settings.get("userlist").unwrap().is_none());
        settings.set("userlist", "one").unwrap();
        settings.set("other", "two").unwrap();
        settings.set("userlist", "three").unwrap();

        let reopened = SettingsFile::new(settings.path());
        assert_eq!(reopened.get("userlist").unwrap().as_deref(), Some("three"));
        assert_eq!(reopened.get("other").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leader.json");
        std::fs::write(&path, "not json").unwrap();
        let settings = SettingsFile::new(&path);
        assert!(matches!(
            settings.get("userlist"),
            Err(CredentialError::SettingsFormat { .. })
        ));
    }
}
