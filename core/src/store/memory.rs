//! Staged in-memory record storage.
//!
//! `Workspace` is the shared bookkeeping for every context: a committed
//! snapshot and a working copy that reads and staged writes go through.
//! `MemoryContext` guards one with an `RwLock`.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde_json::Value;

use super::{PersistentContext, RecordChange, RecordEdit, StoreError};

pub(crate) type Entities = BTreeMap<String, Vec<Value>>;

/// Committed records plus the staged working copy.
#[derive(Debug, Default)]
pub(crate) struct Workspace {
    committed: Entities,
    working: Entities,
    dirty: bool,
}

impl Workspace {
    pub(crate) fn from_committed(committed: Entities) -> Self {
        Self {
            working: committed.clone(),
            committed,
            dirty: false,
        }
    }

    pub(crate) fn committed(&self) -> &Entities {
        &self.committed
    }

    pub(crate) fn fetch_all(&self, entity: &str) -> Vec<Value> {
        self.working.get(entity).cloned().unwrap_or_default()
    }

    pub(crate) fn count(&self, entity: &str) -> usize {
        self.working.get(entity).map_or(0, Vec::len)
    }

    pub(crate) fn insert(&mut self, entity: &str, record: Value) {
        self.working.entry(entity.to_string()).or_default().push(record);
        self.dirty = true;
    }

    /// Run `edit` over a copy of the working records and stage the result
    /// only if every record was handled and at least one changed.
    pub(crate) fn apply(&mut self, entity: &str, edit: &mut RecordEdit<'_>) -> Result<usize, StoreError> {
        let Some(records) = self.working.get(entity) else {
            return Ok(0);
        };
        let mut kept = Vec::with_capacity(records.len());
        let mut changed = 0;
        for record in records {
            let mut record = record.clone();
            match edit(&mut record)? {
                RecordChange::Keep => kept.push(record),
                RecordChange::Updated => {
                    kept.push(record);
                    changed += 1;
                }
                RecordChange::Remove => changed += 1,
            }
        }
        if changed == 0 {
            return Ok(0);
        }
        if kept.is_empty() {
            self.working.remove(entity);
        } else {
            self.working.insert(entity.to_string(), kept);
        }
        self.dirty = true;
        Ok(changed)
    }

    pub(crate) fn batch_delete(&mut self, entity: &str) -> usize {
        let removed = self.working.remove(entity).map_or(0, |records| records.len());
        self.committed.remove(entity);
        removed
    }

    pub(crate) fn has_changes(&self) -> bool {
        self.dirty
    }

    /// The snapshot `commit` would make durable.
    pub(crate) fn pending(&self) -> &Entities {
        &self.working
    }

    pub(crate) fn mark_committed(&mut self) {
        self.committed = self.working.clone();
        self.dirty = false;
    }
}

/// In-memory `PersistentContext`. Nothing survives the process; intended for
/// tests and previews.
#[derive(Debug, Default)]
pub struct MemoryContext {
    inner: RwLock<Workspace>,
}

impl MemoryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed records of `entity`, ignoring staged changes.
    pub fn committed_count(&self, entity: &str) -> Result<usize, StoreError> {
        let ws = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(ws.committed().get(entity).map_or(0, Vec::len))
    }
}

impl PersistentContext for MemoryContext {
    fn fetch_all(&self, entity: &str) -> Result<Vec<Value>, StoreError> {
        let ws = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(ws.fetch_all(entity))
    }

    fn insert(&self, entity: &str, record: Value) -> Result<(), StoreError> {
        let mut ws = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        ws.insert(entity, record);
        Ok(())
    }

    fn apply(&self, entity: &str, edit: &mut RecordEdit<'_>) -> Result<usize, StoreError> {
        let mut ws = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        ws.apply(entity, edit)
    }

    fn batch_delete(&self, entity: &str) -> Result<usize, StoreError> {
        let mut ws = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        Ok(ws.batch_delete(entity))
    }

    fn count(&self, entity: &str) -> Result<usize, StoreError> {
        let ws = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(ws.count(entity))
    }

    fn has_changes(&self) -> Result<bool, StoreError> {
        let ws = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(ws.has_changes())
    }

    fn commit(&self) -> Result<(), StoreError> {
        let mut ws = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        ws.mark_committed();
        Ok(())
    }
}
