//! Mock DocumentStoreClient for testing.
//!
//! Records all mutating calls for assertions, stores data in memory so
//! reads observe earlier writes, and supports fault injection (fail
//! everything, or delay every operation past a timeout).

use replica_coordinator::store::{
    Document, DocumentStoreClient, ListOptions, MemoryStore, StoreError, StoreFuture,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// A recorded upsert/create call.
#[derive(Debug, Clone)]
pub struct WriteCall {
    pub collection: String,
    pub document_id: String,
    #[allow(dead_code)] // Recorded for detailed assertions
    pub data: Value,
}

/// A recorded delete call.
#[derive(Debug, Clone)]
pub struct DeleteCall {
    #[allow(dead_code)]
    pub collection: String,
    pub document_id: String,
}

/// Mock store that records calls and supports fault injection.
///
/// # Example
/// ```rust,ignore
/// let mock = Arc::new(MockStore::new());
/// coordinator.registry().install_client("secondary", mock.clone());
///
/// // ... drive the coordinator ...
///
/// assert_eq!(mock.writes().await.len(), 1);
/// mock.set_failing(true); // every call now errors
/// ```
pub struct MockStore {
    backing: MemoryStore,
    writes: RwLock<Vec<WriteCall>>,
    deletes: RwLock<Vec<DeleteCall>>,
    reads: AtomicUsize,
    failing: AtomicBool,
    delay: RwLock<Option<Duration>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            backing: MemoryStore::new(),
            writes: RwLock::new(Vec::new()),
            deletes: RwLock::new(Vec::new()),
            reads: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            delay: RwLock::new(None),
        }
    }

    /// A mock that fails every operation from the start.
    pub fn failing() -> Self {
        let mock = Self::new();
        mock.failing.store(true, Ordering::Release);
        mock
    }

    /// Toggle failure mode at any point.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    /// Delay every operation by `delay` (for timeout tests).
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().await = delay;
    }

    /// All recorded create/upsert calls.
    pub async fn writes(&self) -> Vec<WriteCall> {
        self.writes.read().await.clone()
    }

    /// All recorded delete calls.
    pub async fn deletes(&self) -> Vec<DeleteCall> {
        self.deletes.read().await.clone()
    }

    /// Total read-side calls (list + get) observed.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Acquire)
    }

    /// Direct (unrecorded) access to the backing data, for seeding and
    /// asserting without disturbing call counts.
    pub fn backing(&self) -> &MemoryStore {
        &self.backing
    }

    async fn gate(&self) -> Result<(), StoreError> {
        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::Acquire) {
            Err(StoreError::new("mock: injected failure"))
        } else {
            Ok(())
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStoreClient for MockStore {
    fn list_documents(
        &self,
        collection: &str,
        options: ListOptions,
    ) -> StoreFuture<'_, Vec<Document>> {
        let collection = collection.to_string();
        Box::pin(async move {
            self.reads.fetch_add(1, Ordering::AcqRel);
            self.gate().await?;
            self.backing.list_documents(&collection, options).await
        })
    }

    fn get_document(&self, collection: &str, id: &str) -> StoreFuture<'_, Option<Document>> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            self.reads.fetch_add(1, Ordering::AcqRel);
            self.gate().await?;
            self.backing.get_document(&collection, &id).await
        })
    }

    fn create_document(&self, collection: &str, data: Value) -> StoreFuture<'_, String> {
        let collection = collection.to_string();
        Box::pin(async move {
            self.gate().await?;
            let id = self
                .backing
                .create_document(&collection, data.clone())
                .await?;
            self.writes.write().await.push(WriteCall {
                collection,
                document_id: id.clone(),
                data,
            });
            Ok(id)
        })
    }

    fn upsert_document(&self, collection: &str, id: &str, data: Value) -> StoreFuture<'_, ()> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            self.gate().await?;
            self.backing
                .upsert_document(&collection, &id, data.clone())
                .await?;
            self.writes.write().await.push(WriteCall {
                collection,
                document_id: id,
                data,
            });
            Ok(())
        })
    }

    fn update_document(&self, collection: &str, id: &str, patch: Value) -> StoreFuture<'_, ()> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            self.gate().await?;
            self.backing
                .update_document(&collection, &id, patch.clone())
                .await?;
            self.writes.write().await.push(WriteCall {
                collection,
                document_id: id,
                data: patch,
            });
            Ok(())
        })
    }

    fn delete_document(&self, collection: &str, id: &str) -> StoreFuture<'_, ()> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            self.gate().await?;
            self.backing.delete_document(&collection, &id).await?;
            self.deletes.write().await.push(DeleteCall {
                collection,
                document_id: id,
            });
            Ok(())
        })
    }
}
