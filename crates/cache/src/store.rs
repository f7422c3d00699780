use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CacheError;

/// One cache entry: a facility code and its serialized row bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheRecord {
    pub key: String,
    pub value: String,
}

impl CacheRecord {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A namespaced key-value store with atomic batch writes per namespace.
///
/// Implementations must apply a batch all-or-nothing: a failed call leaves
/// the namespace exactly as it was.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Upsert every record into `namespace`. Returns the number written.
    async fn batch_put(&self, namespace: &str, records: Vec<CacheRecord>) -> Result<usize, CacheError>;

    /// Drop the namespace's current contents and write `records` in its place.
    async fn replace(&self, namespace: &str, records: Vec<CacheRecord>) -> Result<usize, CacheError>;

    /// Fetch one value.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, CacheError>;

    /// Number of records held in `namespace` (0 if it does not exist).
    async fn len(&self, namespace: &str) -> Result<usize, CacheError>;

    /// Names of all non-empty namespaces.
    async fn namespaces(&self) -> Result<Vec<String>, CacheError>;
}

/// Handle to a single namespace of a shared store.
#[derive(Clone)]
pub struct Namespace {
    store: Arc<dyn CacheStore>,
    name: String,
}

impl Namespace {
    pub fn new(store: Arc<dyn CacheStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn batch_put(&self, records: Vec<CacheRecord>) -> Result<usize, CacheError> {
        self.store.batch_put(&self.name, records).await
    }

    pub async fn replace(&self, records: Vec<CacheRecord>) -> Result<usize, CacheError> {
        self.store.replace(&self.name, records).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.store.get(&self.name, key).await
    }

    pub async fn len(&self) -> Result<usize, CacheError> {
        self.store.len(&self.name).await
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace").field("name", &self.name).finish()
    }
}
