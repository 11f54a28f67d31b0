//! In-memory live store, for tests and embedding.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

use chron_core::target::{TargetRef, TargetType};
use serde_json::Value;

use super::live::{LiveRecord, LiveStore, LiveStoreError};

type Rows = BTreeMap<String, BTreeMap<String, Value>>;

/// A `LiveStore` over a map of id → attributes.
#[derive(Debug)]
pub struct MemoryLiveStore {
    kind: TargetType,
    schema: Option<BTreeSet<String>>,
    unique: bool,
    rows: RwLock<Rows>,
}

fn poisoned<T>(_: PoisonError<T>) -> LiveStoreError {
    LiveStoreError::Other(anyhow::anyhow!("memory live store lock poisoned"))
}

impl MemoryLiveStore {
    #[must_use]
    pub fn new(kind: impl Into<TargetType>) -> Self {
        Self {
            kind: kind.into(),
            schema: None,
            unique: true,
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    /// Restrict records to the named attributes.
    #[must_use]
    pub fn with_schema<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    /// Allow restoring a record whose id is already taken (it is overwritten).
    #[must_use]
    pub const fn non_unique(mut self) -> Self {
        self.unique = false;
        self
    }

    fn target(&self, id: &str) -> TargetRef {
        TargetRef::new(self.kind.clone(), id)
    }

    /// Seed a record directly, bypassing the store protocol.
    ///
    /// # Errors
    ///
    /// Returns `LiveStoreError::Other` if the lock is poisoned.
    pub fn insert(
        &self,
        id: &str,
        attributes: BTreeMap<String, Value>,
    ) -> Result<(), LiveStoreError> {
        self.rows
            .write()
            .map_err(poisoned)?
            .insert(id.to_string(), attributes);
        Ok(())
    }

    /// Number of live records.
    ///
    /// # Errors
    ///
    /// Returns `LiveStoreError::Other` if the lock is poisoned.
    pub fn count(&self) -> Result<usize, LiveStoreError> {
        Ok(self.rows.read().map_err(poisoned)?.len())
    }
}

impl LiveStore for MemoryLiveStore {
    fn find(&self, id: &str) -> Result<Option<LiveRecord>, LiveStoreError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows
            .get(id)
            .map(|attributes| self.build(id).with_attributes(attributes.clone())))
    }

    fn build(&self, id: &str) -> LiveRecord {
        LiveRecord::new(self.target(id)).with_schema(self.schema.clone())
    }

    fn create(&self, record: LiveRecord) -> Result<(), LiveStoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        if self.unique && rows.contains_key(&record.target.id) {
            return Err(LiveStoreError::Conflict(record.target));
        }
        rows.insert(record.target.id, record.attributes);
        Ok(())
    }

    fn update(&self, record: &LiveRecord) -> Result<(), LiveStoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        match rows.get_mut(&record.target.id) {
            Some(existing) => {
                existing.clone_from(&record.attributes);
                Ok(())
            }
            None => Err(LiveStoreError::NotFound(record.target.clone())),
        }
    }

    fn delete(&self, record: &LiveRecord) -> Result<(), LiveStoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        rows.remove(&record.target.id)
            .map(|_| ())
            .ok_or_else(|| LiveStoreError::NotFound(record.target.clone()))
    }

    fn unique_identity(&self) -> bool {
        self.unique
    }
}
