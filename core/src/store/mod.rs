//! Persistence façade over an injected record store.
//!
//! # Design
//! A `PersistentContext` is the store: it keeps a working set of records per
//! entity, stages mutations until `commit`, and owns all synchronization.
//! Records cross the boundary as `serde_json::Value`, so a context never needs
//! to know the concrete record types. `PersistenceController` adds typing and
//! maps store failures onto `PersistenceError`.
//!
//! There is no global context. The composition root builds one and shares it
//! by `Arc` with every controller that needs it.

mod controller;
mod file;
mod memory;

pub use controller::PersistenceController;
pub use file::JsonFileContext;
pub use memory::MemoryContext;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A persisted record type.
///
/// The entity name defaults to the unqualified type name, so `app::model::Note`
/// is stored under `"Note"`.
pub trait Record: Serialize + DeserializeOwned {
    fn entity_name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// What `PersistentContext::apply` does with one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordChange {
    Keep,
    Updated,
    Remove,
}

/// Per-record callback for `PersistentContext::apply`.
pub type RecordEdit<'a> = dyn FnMut(&mut Value) -> Result<RecordChange, StoreError> + 'a;

/// Store-level operations the controller builds on.
///
/// Reads see staged changes. `batch_delete` acts on the store directly and is
/// not staged.
pub trait PersistentContext: Send + Sync {
    /// Every record of `entity` in the working set, in insertion order.
    fn fetch_all(&self, entity: &str) -> Result<Vec<Value>, StoreError>;

    /// Stage a new record.
    fn insert(&self, entity: &str, record: Value) -> Result<(), StoreError>;

    /// Visit every record of `entity` in the working set while holding the
    /// context's lock, staging whatever `edit` decides per record.
    ///
    /// `edit` may rewrite the record in place; its return value says whether
    /// to keep it unchanged, keep the rewritten form, or remove it. If `edit`
    /// fails, nothing is staged. Returns how many records were updated or
    /// removed.
    fn apply(&self, entity: &str, edit: &mut RecordEdit<'_>) -> Result<usize, StoreError>;

    /// Remove every record of `entity`, committed or staged. Returns how many
    /// records were removed.
    fn batch_delete(&self, entity: &str) -> Result<usize, StoreError>;

    fn count(&self, entity: &str) -> Result<usize, StoreError> {
        Ok(self.fetch_all(entity)?.len())
    }

    /// Whether there are staged changes to commit.
    fn has_changes(&self) -> Result<bool, StoreError>;

    /// Make staged changes durable.
    fn commit(&self) -> Result<(), StoreError>;
}

/// Errors raised by `PersistentContext` implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store lock poisoned")]
    Poisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt store: {0}")]
    Corrupt(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
