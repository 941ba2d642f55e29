//! In-process document store.
//!
//! Backs tests and standalone/demo mode. Collections live in a single
//! `RwLock`-guarded map; every operation clones the documents it returns
//! so callers never observe later mutations.

use crate::store::{Document, DocumentStoreClient, ListOptions, StoreError, StoreFuture};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// An in-memory [`DocumentStoreClient`].
///
/// # Fault injection
///
/// `set_offline(true)` makes every subsequent operation fail with a
/// connection error, which lets tests and demos simulate a replica
/// outage without a real network.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, HashMap<String, Value>>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle the simulated outage. While offline, every operation
    /// returns `Err("connection refused (offline)")`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.is_offline() {
            Err(StoreError::new("connection refused (offline)"))
        } else {
            Ok(())
        }
    }

    /// Number of documents in a collection. Used by sync tooling.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }
}

impl DocumentStoreClient for MemoryStore {
    fn list_documents(
        &self,
        collection: &str,
        options: ListOptions,
    ) -> StoreFuture<'_, Vec<Document>> {
        let collection = collection.to_string();
        Box::pin(async move {
            self.check_online()?;
            let collections = self.collections.read().await;
            let docs: Vec<Document> = collections
                .get(&collection)
                .map(|c| {
                    c.iter()
                        .map(|(id, data)| Document::new(id.clone(), data.clone()))
                        .collect()
                })
                .unwrap_or_default();
            Ok(options.apply(docs))
        })
    }

    fn get_document(&self, collection: &str, id: &str) -> StoreFuture<'_, Option<Document>> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            self.check_online()?;
            let collections = self.collections.read().await;
            Ok(collections
                .get(&collection)
                .and_then(|c| c.get(&id))
                .map(|data| Document::new(id.clone(), data.clone())))
        })
    }

    fn create_document(&self, collection: &str, data: Value) -> StoreFuture<'_, String> {
        let collection = collection.to_string();
        Box::pin(async move {
            self.check_online()?;
            let id = Uuid::new_v4().to_string();
            let mut collections = self.collections.write().await;
            collections
                .entry(collection)
                .or_default()
                .insert(id.clone(), data);
            Ok(id)
        })
    }

    fn upsert_document(&self, collection: &str, id: &str, data: Value) -> StoreFuture<'_, ()> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            self.check_online()?;
            let mut collections = self.collections.write().await;
            collections.entry(collection).or_default().insert(id, data);
            Ok(())
        })
    }

    fn update_document(&self, collection: &str, id: &str, patch: Value) -> StoreFuture<'_, ()> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            self.check_online()?;
            let mut collections = self.collections.write().await;
            let existing = collections
                .get_mut(&collection)
                .and_then(|c| c.get_mut(&id))
                .ok_or_else(|| {
                    StoreError::new(format!("document not found: {}/{}", collection, id))
                })?;

            // Shallow top-level merge; non-object patches replace outright.
            match (existing.as_object_mut(), patch.as_object()) {
                (Some(target), Some(fields)) => {
                    for (key, value) in fields {
                        target.insert(key.clone(), value.clone());
                    }
                }
                _ => *existing = patch,
            }
            Ok(())
        })
    }

    fn delete_document(&self, collection: &str, id: &str) -> StoreFuture<'_, ()> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            self.check_online()?;
            let mut collections = self.collections.write().await;
            if let Some(c) = collections.get_mut(&collection) {
                c.remove(&id);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OrderBy;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryStore::new();
        let id = store
            .create_document("products", json!({"name": "Cement 50kg"}))
            .await
            .unwrap();

        let doc = store.get_document("products", &id).await.unwrap();
        assert_eq!(doc.unwrap().data["name"], "Cement 50kg");
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = MemoryStore::new();
        let doc = store.get_document("products", "nope").await.unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn test_create_generates_unique_ids() {
        let store = MemoryStore::new();
        let a = store
            .create_document("products", json!({"n": 1}))
            .await
            .unwrap();
        let b = store
            .create_document("products", json!({"n": 2}))
            .await
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(store.count("products").await, 2);
    }

    #[tokio::test]
    async fn test_upsert_creates_then_replaces() {
        let store = MemoryStore::new();
        store
            .upsert_document("products", "p1", json!({"name": "old", "stock": 3}))
            .await
            .unwrap();
        store
            .upsert_document("products", "p1", json!({"name": "new"}))
            .await
            .unwrap();

        let doc = store.get_document("products", "p1").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"name": "new"}));
    }

    #[tokio::test]
    async fn test_update_merges_top_level() {
        let store = MemoryStore::new();
        store
            .upsert_document("products", "p1", json!({"name": "Rebar", "stock": 3}))
            .await
            .unwrap();
        store
            .update_document("products", "p1", json!({"stock": 7}))
            .await
            .unwrap();

        let doc = store.get_document("products", "p1").await.unwrap().unwrap();
        assert_eq!(doc.data["name"], "Rebar");
        assert_eq!(doc.data["stock"], 7);
    }

    #[tokio::test]
    async fn test_update_missing_fails() {
        let store = MemoryStore::new();
        let result = store
            .update_document("products", "ghost", json!({"stock": 7}))
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store
            .upsert_document("products", "p1", json!({"name": "x"}))
            .await
            .unwrap();

        store.delete_document("products", "p1").await.unwrap();
        assert!(store
            .get_document("products", "p1")
            .await
            .unwrap()
            .is_none());

        // Second delete of the same id still succeeds.
        store.delete_document("products", "p1").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_applies_options() {
        let store = MemoryStore::new();
        for (id, stock) in [("a", 5), ("b", 9), ("c", 2)] {
            store
                .upsert_document("products", id, json!({"stock": stock}))
                .await
                .unwrap();
        }

        let docs = store
            .list_documents(
                "products",
                ListOptions::default()
                    .with_order(OrderBy::desc("stock"))
                    .with_limit(2),
            )
            .await
            .unwrap();

        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_list_unknown_collection_is_empty() {
        let store = MemoryStore::new();
        let docs = store
            .list_documents("nothing", ListOptions::default())
            .await
            .unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_offline_fails_all_operations() {
        let store = MemoryStore::new();
        store
            .upsert_document("products", "p1", json!({"name": "x"}))
            .await
            .unwrap();

        store.set_offline(true);
        assert!(store.is_offline());
        assert!(store
            .list_documents("products", ListOptions::default())
            .await
            .is_err());
        assert!(store.get_document("products", "p1").await.is_err());
        assert!(store
            .create_document("products", json!({}))
            .await
            .is_err());
        assert!(store.delete_document("products", "p1").await.is_err());

        // Back online: data survived the outage.
        store.set_offline(false);
        assert!(store
            .get_document("products", "p1")
            .await
            .unwrap()
            .is_some());
    }
}
