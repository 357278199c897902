//! Stores for outgoing records.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::Mutex;

use crate::peers::{RecordMap, RelationId};

use super::{AdvertisementPublisher, PublishError};

type Records = BTreeMap<RelationId, RecordMap>;

/// Outgoing records kept in process. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutbox {
    inner: Arc<Mutex<Records>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, relation: &RelationId) -> Option<RecordMap> {
        self.inner.lock().get(relation).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl AdvertisementPublisher for MemoryOutbox {
    fn publish(&self, relation: &RelationId, record: RecordMap) -> Result<(), PublishError> {
        self.inner.lock().insert(relation.clone(), record);
        Ok(())
    }
}

/// Outgoing records persisted as one JSON object keyed by relation id.
///
/// The distributed store picks the file up after the pass.
#[derive(Debug, Clone)]
pub struct OutboxFile {
    path: PathBuf,
}

impl OutboxFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Everything published so far.
    pub fn records(&self) -> Result<Records, PublishError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Records::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        file.lock_shared().map_err(|e| self.io_err(e))?;
        let result = self.read_locked(&mut file);
        let _ = FileExt::unlock(&file);
        result
    }

    fn io_err(&self, source: std::io::Error) -> PublishError {
        PublishError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn format_err(&self, source: serde_json::Error) -> PublishError {
        PublishError::Format {
            path: self.path.clone(),
            source,
        }
    }

    fn read_locked(&self, file: &mut File) -> Result<Records, PublishError> {
        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| self.io_err(e))?;
        if content.trim().is_empty() {
            return Ok(Records::new());
        }
        serde_json::from_str(&content).map_err(|e| self.format_err(e))
    }
}

impl AdvertisementPublisher for OutboxFile {
    fn publish(&self, relation: &RelationId, record: RecordMap) -> Result<(), PublishError> {
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
            let mut records = self.read_locked(&mut file)?;
            records.insert(relation.clone(), record);
            let encoded =
                serde_json::to_string_pretty(&records).map_err(|e| self.format_err(e))?;
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
