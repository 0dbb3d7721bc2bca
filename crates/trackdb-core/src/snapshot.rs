//! Database-snapshot boundary to the persistence collaborator: fetch the
//! as-persisted row for an entry, sync or async. Row absence is a `None`
//! return, never an error.

use crate::key::KeyTuple;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error as ThisError;

///
/// SnapshotError
///
/// Transport failure from the snapshot source. A missing row is not an
/// error; sources return `Ok(None)` for it.
///

#[derive(Debug, ThisError)]
#[error("snapshot source failure: {message}")]
pub struct SnapshotError {
    pub message: String,
}

impl SnapshotError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

///
/// StoredRow
///
/// One as-persisted row crossing the boundary: the stored discriminator
/// plus column values by property name.
///

#[derive(Clone, Debug)]
pub struct StoredRow {
    /// Discriminator: the entity name the row was persisted as.
    pub entity: String,
    pub values: BTreeMap<String, Value>,
}

impl StoredRow {
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            values: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(property.into(), value.into());
        self
    }
}

///
/// SnapshotSource
///
/// The persistence collaborator's row-fetch surface. `root` is the root
/// entity of the inheritance chain (the table); `key` the primary-key
/// tuple. The async form defaults to the sync fetch for sources without a
/// real suspension point.
///

#[async_trait(?Send)]
pub trait SnapshotSource: Send {
    fn fetch(&self, root: &str, key: &KeyTuple) -> Result<Option<StoredRow>, SnapshotError>;

    async fn fetch_async(
        &self,
        root: &str,
        key: &KeyTuple,
    ) -> Result<Option<StoredRow>, SnapshotError> {
        self.fetch(root, key)
    }
}

///
/// MemorySnapshotSource
///
/// In-memory source keyed by root entity and key tuple; the in-repo test
/// double for the persistence collaborator.
///

#[derive(Debug, Default)]
pub struct MemorySnapshotSource {
    rows: Mutex<BTreeMap<(String, KeyTuple), StoredRow>>,
}

impl MemorySnapshotSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, root: impl Into<String>, key: KeyTuple, row: StoredRow) {
        self.rows
            .lock()
            .expect("snapshot rows poisoned")
            .insert((root.into(), key), row);
    }

    pub fn remove(&self, root: &str, key: &KeyTuple) {
        self.rows
            .lock()
            .expect("snapshot rows poisoned")
            .remove(&(root.to_string(), key.clone()));
    }
}

impl SnapshotSource for MemorySnapshotSource {
    fn fetch(&self, root: &str, key: &KeyTuple) -> Result<Option<StoredRow>, SnapshotError> {
        Ok(self
            .rows
            .lock()
            .expect("snapshot rows poisoned")
            .get(&(root.to_string(), key.clone()))
            .cloned())
    }
}
