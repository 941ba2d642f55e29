// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis-backed document store.
//!
//! # Key Layout
//!
//! ```text
//! {prefix}{collection}:{id}      JSON-serialized document payload
//! {prefix}{collection}:__ids__   SET of document ids in the collection
//! ```
//!
//! Queries are evaluated client-side: `list_documents` loads the
//! collection via the id set and applies filters/ordering/limit in
//! process. That matches the access pattern of the storefront this
//! serves (small catalog collections, heavy reads through the primary).
//!
//! # Connection Lifecycle
//!
//! Connections are **lazy**: `RedisStore::new` only parses the URL; the
//! first operation establishes a multiplexed
//! [`redis::aio::ConnectionManager`], which reconnects automatically on
//! connection loss. A replica with an unreachable Redis therefore fails
//! at operation time, where the health monitor records it, rather than
//! at startup.

use crate::store::{Document, DocumentStoreClient, ListOptions, StoreError, StoreFuture};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde_json::Value;
use tokio::sync::RwLock;

/// A [`DocumentStoreClient`] backed by one Redis instance.
pub struct RedisStore {
    client: Client,
    conn: RwLock<Option<ConnectionManager>>,
    key_prefix: String,
}

impl RedisStore {
    /// Create a store handle. Fails only on a malformed URL; the actual
    /// connection is established on first use.
    pub fn new(url: &str, key_prefix: Option<&str>) -> Result<Self, StoreError> {
        let client = Client::open(url)
            .map_err(|e| StoreError::new(format!("invalid redis url: {}", e)))?;
        Ok(Self {
            client,
            conn: RwLock::new(None),
            key_prefix: key_prefix.unwrap_or_default().to_string(),
        })
    }

    fn doc_key(&self, collection: &str, id: &str) -> String {
        format!("{}{}:{}", self.key_prefix, collection, id)
    }

    fn index_key(&self, collection: &str) -> String {
        format!("{}{}:__ids__", self.key_prefix, collection)
    }

    /// Get the multiplexed connection, establishing it lazily.
    ///
    /// ConnectionManager is Clone and shares the underlying socket, so
    /// handing out clones is cheap.
    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        {
            let guard = self.conn.read().await;
            if let Some(conn) = guard.as_ref() {
                return Ok(conn.clone());
            }
        }

        let mut guard = self.conn.write().await;
        // Another caller may have connected while we waited for the lock.
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::new(format!("redis connect failed: {}", e)))?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn read_document(
        &self,
        conn: &mut ConnectionManager,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let raw: Option<String> = conn
            .get(self.doc_key(collection, id))
            .await
            .map_err(|e| StoreError::new(format!("GET failed: {}", e)))?;
        match raw {
            Some(json) => {
                let data: Value = serde_json::from_str(&json)
                    .map_err(|e| StoreError::new(format!("corrupt document {}: {}", id, e)))?;
                Ok(Some(Document::new(id, data)))
            }
            None => Ok(None),
        }
    }

    async fn write_document(
        &self,
        conn: &mut ConnectionManager,
        collection: &str,
        id: &str,
        data: &Value,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(data)
            .map_err(|e| StoreError::new(format!("serialize failed: {}", e)))?;
        let _: () = conn
            .set(self.doc_key(collection, id), json)
            .await
            .map_err(|e| StoreError::new(format!("SET failed: {}", e)))?;
        let _: () = conn
            .sadd(self.index_key(collection), id)
            .await
            .map_err(|e| StoreError::new(format!("SADD failed: {}", e)))?;
        Ok(())
    }
}

impl DocumentStoreClient for RedisStore {
    fn list_documents(
        &self,
        collection: &str,
        options: ListOptions,
    ) -> StoreFuture<'_, Vec<Document>> {
        let collection = collection.to_string();
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let ids: Vec<String> = conn
                .smembers(self.index_key(&collection))
                .await
                .map_err(|e| StoreError::new(format!("SMEMBERS failed: {}", e)))?;

            let mut docs = Vec::with_capacity(ids.len());
            for id in ids {
                // A missing key means the id set is stale (document deleted
                // concurrently); skip it rather than failing the listing.
                if let Some(doc) = self.read_document(&mut conn, &collection, &id).await? {
                    docs.push(doc);
                }
            }
            Ok(options.apply(docs))
        })
    }

    fn get_document(&self, collection: &str, id: &str) -> StoreFuture<'_, Option<Document>> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            let mut conn = self.connection().await?;
            self.read_document(&mut conn, &collection, &id).await
        })
    }

    fn create_document(&self, collection: &str, data: Value) -> StoreFuture<'_, String> {
        let collection = collection.to_string();
        Box::pin(async move {
            let id = uuid::Uuid::new_v4().to_string();
            let mut conn = self.connection().await?;
            self.write_document(&mut conn, &collection, &id, &data)
                .await?;
            Ok(id)
        })
    }

    fn upsert_document(&self, collection: &str, id: &str, data: Value) -> StoreFuture<'_, ()> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            let mut conn = self.connection().await?;
            self.write_document(&mut conn, &collection, &id, &data).await
        })
    }

    fn update_document(&self, collection: &str, id: &str, patch: Value) -> StoreFuture<'_, ()> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let mut doc = self
                .read_document(&mut conn, &collection, &id)
                .await?
                .ok_or_else(|| {
                    StoreError::new(format!("document not found: {}/{}", collection, id))
                })?;

            match (doc.data.as_object_mut(), patch.as_object()) {
                (Some(target), Some(fields)) => {
                    for (key, value) in fields {
                        target.insert(key.clone(), value.clone());
                    }
                }
                _ => doc.data = patch,
            }
            self.write_document(&mut conn, &collection, &id, &doc.data)
                .await
        })
    }

    fn delete_document(&self, collection: &str, id: &str) -> StoreFuture<'_, ()> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let _: () = conn
                .del(self.doc_key(&collection, &id))
                .await
                .map_err(|e| StoreError::new(format!("DEL failed: {}", e)))?;
            let _: () = conn
                .srem(self.index_key(&collection), &id)
                .await
                .map_err(|e| StoreError::new(format!("SREM failed: {}", e)))?;
            Ok(())
        })
    }
}
