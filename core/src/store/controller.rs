//! Typed persistence operations over a shared context.

use std::sync::Arc;

use serde_json::Value;

use super::{PersistentContext, Record, RecordChange, StoreError};
use crate::error::PersistenceError;

const TARGET: &str = "netkit::store";

/// Typed save/fetch/delete over a shared `PersistentContext`.
///
/// The controller adds no locking of its own; concurrent callers are
/// serialized, or not, by the context.
#[derive(Debug)]
pub struct PersistenceController<C> {
    context: Arc<C>,
}

impl<C> Clone for PersistenceController<C> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
        }
    }
}

impl<C: PersistentContext> PersistenceController<C> {
    pub fn new(context: Arc<C>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    /// Commit staged changes. Succeeds without touching the store when there
    /// is nothing to commit.
    pub fn save_data(&self) -> Result<(), PersistenceError> {
        let pending = self.context.has_changes().map_err(|e| fail("save data", &e, PersistenceError::SaveError))?;
        if !pending {
            return Ok(());
        }
        self.context
            .commit()
            .map_err(|e| fail("save data", &e, PersistenceError::SaveError))?;
        tracing::debug!(target: TARGET, "save data success");
        Ok(())
    }

    /// All records of type `R`. An entity with no records yields an empty Vec.
    pub fn get_saved_data<R: Record>(&self) -> Result<Vec<R>, PersistenceError> {
        let entity = R::entity_name();
        let records = self
            .context
            .fetch_all(entity)
            .and_then(decode_all::<R>)
            .map_err(|e| fail("get saved data", &e, PersistenceError::FetchError))?;
        tracing::debug!(target: TARGET, entity, count = records.len(), "get saved data success");
        Ok(records)
    }

    /// Remove every record of type `R` from the store.
    pub fn delete_saved_data<R: Record>(&self) -> Result<(), PersistenceError> {
        let entity = R::entity_name();
        let removed = self
            .context
            .batch_delete(entity)
            .map_err(|e| fail("delete saved data", &e, PersistenceError::DeleteError))?;
        tracing::debug!(target: TARGET, entity, removed, "delete saved data success");
        Ok(())
    }

    /// Stage a new record. It becomes durable on the next `save_data`.
    pub fn create<R: Record>(&self, record: &R) -> Result<(), PersistenceError> {
        serde_json::to_value(record)
            .map_err(StoreError::from)
            .and_then(|value| self.context.insert(R::entity_name(), value))
            .map_err(|e| fail("create", &e, PersistenceError::SaveError))
    }

    pub fn fetch_where<R: Record>(&self, predicate: impl Fn(&R) -> bool) -> Result<Vec<R>, PersistenceError> {
        Ok(self
            .get_saved_data::<R>()?
            .into_iter()
            .filter(|record| predicate(record))
            .collect())
    }

    /// First record matching `predicate`. No match is `Ok(None)`, the same
    /// contract as an empty `get_saved_data`.
    pub fn first_where<R: Record>(&self, predicate: impl Fn(&R) -> bool) -> Result<Option<R>, PersistenceError> {
        Ok(self.get_saved_data::<R>()?.into_iter().find(|record| predicate(record)))
    }

    pub fn exists<R: Record>(&self, predicate: impl Fn(&R) -> bool) -> Result<bool, PersistenceError> {
        Ok(self.first_where(predicate)?.is_some())
    }

    pub fn count<R: Record>(&self) -> Result<usize, PersistenceError> {
        self.context
            .count(R::entity_name())
            .map_err(|e| fail("count", &e, PersistenceError::FetchError))
    }

    /// Apply `update` to every record matching `predicate` and save. Returns
    /// the number of records changed.
    ///
    /// Matching and rewriting run inside the context, so records other callers
    /// add meanwhile are never overwritten.
    pub fn update_where<R: Record>(
        &self,
        predicate: impl Fn(&R) -> bool,
        update: impl Fn(&mut R),
    ) -> Result<usize, PersistenceError> {
        let changed = self
            .context
            .apply(R::entity_name(), &mut |value: &mut Value| -> Result<RecordChange, StoreError> {
                let mut record: R = serde_json::from_value(value.clone())?;
                if !predicate(&record) {
                    return Ok(RecordChange::Keep);
                }
                update(&mut record);
                *value = serde_json::to_value(&record)?;
                Ok(RecordChange::Updated)
            })
            .map_err(|e| fail("update", &e, PersistenceError::UpdateError))?;
        if changed > 0 {
            self.save_data()?;
        }
        Ok(changed)
    }

    /// Delete every record matching `predicate` and save. Returns the number
    /// of records removed.
    pub fn delete_where<R: Record>(&self, predicate: impl Fn(&R) -> bool) -> Result<usize, PersistenceError> {
        let removed = self
            .context
            .apply(R::entity_name(), &mut |value: &mut Value| -> Result<RecordChange, StoreError> {
                let record: R = serde_json::from_value(value.clone())?;
                Ok(if predicate(&record) { RecordChange::Remove } else { RecordChange::Keep })
            })
            .map_err(|e| fail("delete", &e, PersistenceError::DeleteError))?;
        if removed > 0 {
            self.save_data()?;
        }
        Ok(removed)
    }
}

fn decode_all<R: Record>(values: Vec<Value>) -> Result<Vec<R>, StoreError> {
    values
        .into_iter()
        .map(|value| serde_json::from_value(value).map_err(StoreError::from))
        .collect()
}

fn fail(operation: &str, error: &StoreError, mapped: PersistenceError) -> PersistenceError {
    tracing::error!(target: TARGET, operation, %error, "store operation failed");
    mapped
}
