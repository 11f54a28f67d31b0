//! Boundary to the application's live records.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use chron_core::revision::Revisable;
use chron_core::target::{TargetRef, TargetType};
use serde_json::Value;
use thiserror::Error;

/// Errors raised by a live record store.
#[derive(Debug, Error)]
pub enum LiveStoreError {
    #[error("Live record {0} not found")]
    NotFound(TargetRef),

    #[error("Live record {0} already exists")]
    Conflict(TargetRef),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A live application record as seen by undo.
///
/// `schema`, when present, names the attributes the record supports;
/// [`Revisable::try_set`] refuses anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveRecord {
    pub target: TargetRef,
    pub attributes: BTreeMap<String, Value>,
    pub schema: Option<BTreeSet<String>>,
}

impl LiveRecord {
    #[must_use]
    pub const fn new(target: TargetRef) -> Self {
        Self {
            target,
            attributes: BTreeMap::new(),
            schema: None,
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Option<BTreeSet<String>>) -> Self {
        self.schema = schema;
        self
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: BTreeMap<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }

    #[must_use]
    pub fn supports(&self, attribute: &str) -> bool {
        self.schema.as_ref().is_none_or(|s| s.contains(attribute))
    }
}

impl Revisable for LiveRecord {
    fn try_set(&mut self, attribute: &str, value: &Value) -> bool {
        if !self.supports(attribute) {
            return false;
        }
        self.attributes.insert(attribute.to_string(), value.clone());
        true
    }
}

/// Accessor for one target type's live records.
///
/// Implementations are synchronous; wrap async backends with a blocking
/// bridge at the application edge.
pub trait LiveStore: Send + Sync {
    /// Look up a live record by id.
    ///
    /// # Errors
    ///
    /// Returns `LiveStoreError` if the backend fails.
    fn find(&self, id: &str) -> Result<Option<LiveRecord>, LiveStoreError>;

    /// A fresh, unsaved record with the given id.
    fn build(&self, id: &str) -> LiveRecord;

    /// Persist a new record.
    ///
    /// # Errors
    ///
    /// Returns `LiveStoreError` if the backend rejects the record.
    fn create(&self, record: LiveRecord) -> Result<(), LiveStoreError>;

    /// Persist changes to an existing record.
    ///
    /// # Errors
    ///
    /// Returns `LiveStoreError` if the backend rejects the update.
    fn update(&self, record: &LiveRecord) -> Result<(), LiveStoreError>;

    /// Remove a record.
    ///
    /// # Errors
    ///
    /// Returns `LiveStoreError` if the backend fails.
    fn delete(&self, record: &LiveRecord) -> Result<(), LiveStoreError>;

    /// Whether two live records may share an id.
    fn unique_identity(&self) -> bool {
        true
    }
}

/// Maps each target type to its live store.
#[derive(Default, Clone)]
pub struct LiveRegistry {
    stores: HashMap<TargetType, Arc<dyn LiveStore>>,
}

impl LiveRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `store` for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: impl Into<TargetType>, store: Arc<dyn LiveStore>) {
        self.stores.insert(kind.into(), store);
    }

    #[must_use]
    pub fn with(mut self, kind: impl Into<TargetType>, store: Arc<dyn LiveStore>) -> Self {
        self.register(kind, store);
        self
    }

    #[must_use]
    pub fn resolve(&self, kind: &TargetType) -> Option<&Arc<dyn LiveStore>> {
        self.stores.get(kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl fmt::Debug for LiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.stores.keys().map(TargetType::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("LiveRegistry").field("kinds", &kinds).finish()
    }
}
