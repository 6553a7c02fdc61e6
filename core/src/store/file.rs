//! Durable `PersistentContext` on a single JSON document.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;

use super::memory::{Entities, Workspace};
use super::{PersistentContext, RecordEdit, StoreError};

/// `PersistentContext` backed by a single JSON document on disk.
///
/// The file holds committed records only, as `{"Entity": [record, ...]}`.
/// Every commit writes a fresh temp file in the same directory and renames
/// it over the document, so a crash never leaves a half-written document
/// behind.
#[derive(Debug)]
pub struct JsonFileContext {
    path: PathBuf,
    inner: Mutex<Workspace>,
}

impl JsonFileContext {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let committed: Entities = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => Entities::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == ErrorKind::NotFound => Entities::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(target: "netkit::store", path = %path.display(), entities = committed.len(), "opened store");
        Ok(Self {
            path,
            inner: Mutex::new(Workspace::from_committed(committed)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, entities: &Entities) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&serde_json::to_vec_pretty(entities)?)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl PersistentContext for JsonFileContext {
    fn fetch_all(&self, entity: &str) -> Result<Vec<Value>, StoreError> {
        let ws = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(ws.fetch_all(entity))
    }

    fn insert(&self, entity: &str, record: Value) -> Result<(), StoreError> {
        let mut ws = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        ws.insert(entity, record);
        Ok(())
    }

    fn apply(&self, entity: &str, edit: &mut RecordEdit<'_>) -> Result<usize, StoreError> {
        let mut ws = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        ws.apply(entity, edit)
    }

    fn batch_delete(&self, entity: &str) -> Result<usize, StoreError> {
        let mut ws = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        let mut remaining = ws.committed().clone();
        if remaining.remove(entity).is_some() {
            self.write(&remaining)?;
        }
        Ok(ws.batch_delete(entity))
    }

    fn count(&self, entity: &str) -> Result<usize, StoreError> {
        let ws = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(ws.count(entity))
    }

    fn has_changes(&self) -> Result<bool, StoreError> {
        let ws = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(ws.has_changes())
    }

    fn commit(&self) -> Result<(), StoreError> {
        let mut ws = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        self.write(ws.pending())?;
        ws.mark_committed();
        Ok(())
    }
}
