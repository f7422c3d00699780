//! In-memory [`CacheStore`] engine.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use crate::error::CacheError;
use crate::store::{CacheRecord, CacheStore};

type Partition = HashMap<String, String>;

/// Process-local store: one `HashMap` per namespace behind a single lock.
///
/// Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    namespaces: RwLock<HashMap<String, Partition>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_keys(namespace: &str, records: &[CacheRecord]) -> Result<(), CacheError> {
    if records.iter().any(|r| r.key.is_empty()) {
        return Err(CacheError::EmptyKey(namespace.to_string()));
    }
    Ok(())
}

fn poisoned<E: std::fmt::Display>(e: E) -> CacheError {
    CacheError::LockPoisoned(format!("memory store: {}", e))
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn batch_put(&self, namespace: &str, records: Vec<CacheRecord>) -> Result<usize, CacheError> {
        check_keys(namespace, &records)?;
        let count = records.len();
        let mut guard = self.namespaces.write().map_err(poisoned)?;
        let partition = guard.entry(namespace.to_string()).or_default();
        for record in records {
            partition.insert(record.key, record.value);
        }
        debug!(namespace, count, "batch put");
        Ok(count)
    }

    async fn replace(&self, namespace: &str, records: Vec<CacheRecord>) -> Result<usize, CacheError> {
        check_keys(namespace, &records)?;
        let partition: Partition = records.into_iter().map(|r| (r.key, r.value)).collect();
        let count = partition.len();
        let mut guard = self.namespaces.write().map_err(poisoned)?;
        let previous = guard.insert(namespace.to_string(), partition);
        debug!(
            namespace,
            count,
            dropped = previous.map(|p| p.len()).unwrap_or(0),
            "namespace replaced"
        );
        Ok(count)
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, CacheError> {
        let guard = self.namespaces.read().map_err(poisoned)?;
        Ok(guard.get(namespace).and_then(|p| p.get(key)).cloned())
    }

    async fn len(&self, namespace: &str) -> Result<usize, CacheError> {
        let guard = self.namespaces.read().map_err(poisoned)?;
        Ok(guard.get(namespace).map(HashMap::len).unwrap_or(0))
    }

    async fn namespaces(&self) -> Result<Vec<String>, CacheError> {
        let guard = self.namespaces.read().map_err(poisoned)?;
        let mut names: Vec<String> = guard
            .iter()
            .filter(|(_, p)| !p.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::Namespace;

    fn records(pairs: &[(&str, &str)]) -> Vec<CacheRecord> {
        pairs.iter().map(|(k, v)| CacheRecord::new(*k, *v)).collect()
    }

    #[tokio::test]
    async fn batch_put_upserts_within_namespace() {
        let store = MemoryStore::new();
        store.batch_put("/a", records(&[("F1", "one"), ("F2", "two")])).await.unwrap();
        store.batch_put("/a", records(&[("F2", "two-b")])).await.unwrap();

        assert_eq!(store.get("/a", "F1").await.unwrap().as_deref(), Some("one"));
        assert_eq!(store.get("/a", "F2").await.unwrap().as_deref(), Some("two-b"));
        assert_eq!(store.len("/a").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let store = MemoryStore::new();
        store.batch_put("/a", records(&[("F1", "a")])).await.unwrap();
        store.batch_put("/b", records(&[("F1", "b")])).await.unwrap();

        assert_eq!(store.get("/a", "F1").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.get("/b", "F1").await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.namespaces().await.unwrap(), vec!["/a", "/b"]);
    }

    #[tokio::test]
    async fn replace_prunes_codes_missing_from_new_batch() {
        let store = MemoryStore::new();
        store.batch_put("/a", records(&[("OLD", "x"), ("KEEP", "y")])).await.unwrap();
        store.replace("/a", records(&[("KEEP", "y2"), ("NEW", "z")])).await.unwrap();

        assert_eq!(store.get("/a", "OLD").await.unwrap(), None);
        assert_eq!(store.get("/a", "KEEP").await.unwrap().as_deref(), Some("y2"));
        assert_eq!(store.len("/a").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn batch_with_empty_key_is_rejected_whole() {
        let store = MemoryStore::new();
        store.batch_put("/a", records(&[("F1", "one")])).await.unwrap();

        let err = store
            .replace("/a", records(&[("F2", "two"), ("", "bad")]))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::EmptyKey(ns) if ns == "/a"));
        assert_eq!(store.get("/a", "F1").await.unwrap().as_deref(), Some("one"));
        assert_eq!(store.get("/a", "F2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn namespace_handle_delegates() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let ns = Namespace::new(Arc::clone(&store), "/x");
        ns.batch_put(records(&[("F1", "v")])).await.unwrap();

        assert_eq!(ns.name(), "/x");
        assert_eq!(ns.get("F1").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.len("/x").await.unwrap(), 1);
        assert_eq!(store.len("/missing").await.unwrap(), 0);
    }
}
