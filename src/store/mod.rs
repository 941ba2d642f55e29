// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document store abstraction.
//!
//! Defines the interface the coordinator uses to talk to one physical
//! database instance. The coordinator never sees a concrete backend —
//! every replica is an `Arc<dyn DocumentStoreClient>` built from a
//! [`ConnectionConfig`] variant.
//!
//! # Backends
//!
//! - [`MemoryStore`](memory::MemoryStore): in-process `HashMap` store.
//!   Used by tests and standalone/demo mode.
//! - [`RedisStore`](redis::RedisStore): documents as JSON strings in
//!   Redis, one index set per collection. Connections are lazy and
//!   multiplexed via `redis::aio::ConnectionManager`.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use replica_coordinator::store::{ConnectionConfig, DocumentStoreClient, ListOptions};
//! use serde_json::json;
//!
//! let client = ConnectionConfig::Memory.build()?;
//!
//! let id = client
//!     .create_document("products", json!({"name": "Rebar 12mm", "stock": 40}))
//!     .await?;
//!
//! let docs = client
//!     .list_documents("products", ListOptions::default().with_limit(10))
//!     .await?;
//! assert_eq!(docs[0].id, id);
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Simplified error for store operations.
///
/// The coordinator only needs the message: replica-local failures are
/// absorbed into health records, not matched on.
#[derive(Debug, Clone)]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StoreError {}

/// A single document: an identifier plus an opaque JSON payload.
///
/// The coordinator never inspects `data`; the repository layer
/// deserializes it into domain models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// Sort direction for [`ListOptions::order_by`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Query options for [`DocumentStoreClient::list_documents`].
///
/// Both provided backends evaluate filters and ordering client-side
/// after fetching the collection; `limit` is applied last.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOptions {
    /// Equality filters: keep documents where `data[field] == value`.
    #[serde(default)]
    pub filters: Vec<(String, Value)>,

    /// Optional ordering. Documents missing the field sort last.
    #[serde(default)]
    pub order_by: Option<OrderBy>,

    /// Optional result cap, applied after filtering and ordering.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ListOptions {
    /// Keep documents where `data[field] == value`.
    pub fn with_filter(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filters.push((field.into(), value));
        self
    }

    pub fn with_order(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Apply filters, ordering, and limit to a fetched document set.
    ///
    /// Shared by backends that evaluate queries client-side.
    pub fn apply(&self, mut docs: Vec<Document>) -> Vec<Document> {
        if !self.filters.is_empty() {
            docs.retain(|doc| {
                self.filters
                    .iter()
                    .all(|(field, value)| doc.data.get(field) == Some(value))
            });
        }

        if let Some(ref order) = self.order_by {
            docs.sort_by(|a, b| {
                let cmp = match (a.data.get(&order.field), b.data.get(&order.field)) {
                    (Some(x), Some(y)) => compare_values(x, y),
                    // Missing fields sort last regardless of direction.
                    (Some(_), None) => return Ordering::Less,
                    (None, Some(_)) => return Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                if order.descending {
                    cmp.reverse()
                } else {
                    cmp
                }
            });
        }

        if let Some(limit) = self.limit {
            docs.truncate(limit);
        }

        docs
    }
}

/// Total order over the JSON values we sort on (numbers, strings, bools).
///
/// Mixed or unsupported types compare equal, which keeps the sort stable
/// rather than panicking on heterogeneous data.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Interface to one physical document database instance.
///
/// All operations are asynchronous and may fail with a connectivity or
/// permission error. Implementations must be cheap to share — the
/// registry hands out one `Arc<dyn DocumentStoreClient>` per replica for
/// the process lifetime.
///
/// This trait allows testing with mocks and decouples the coordinator
/// from any concrete backend.
pub trait DocumentStoreClient: Send + Sync + 'static {
    /// List documents in a collection, honoring [`ListOptions`].
    fn list_documents(&self, collection: &str, options: ListOptions)
        -> StoreFuture<'_, Vec<Document>>;

    /// Fetch a single document, `None` if it does not exist.
    fn get_document(&self, collection: &str, id: &str) -> StoreFuture<'_, Option<Document>>;

    /// Create a document with a generated id; returns the id.
    fn create_document(&self, collection: &str, data: Value) -> StoreFuture<'_, String>;

    /// Write a full document at a known id, creating or replacing it.
    ///
    /// This is the fan-out path: re-applying a mutation that already
    /// committed on the primary must not depend on the document's prior
    /// existence on the secondary.
    fn upsert_document(&self, collection: &str, id: &str, data: Value) -> StoreFuture<'_, ()>;

    /// Shallow-merge `patch` into an existing document's top-level fields.
    ///
    /// Fails if the document does not exist.
    fn update_document(&self, collection: &str, id: &str, patch: Value) -> StoreFuture<'_, ()>;

    /// Delete a document. Deleting a missing document is not an error.
    fn delete_document(&self, collection: &str, id: &str) -> StoreFuture<'_, ()>;
}

/// Connection configuration, one variant per supported backend.
///
/// This is the typed replacement for the opaque per-replica connection
/// blob: adding a backend means adding a variant here and an
/// implementation of [`DocumentStoreClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum ConnectionConfig {
    /// In-process store. No external service required.
    Memory,

    /// Redis-backed store.
    Redis {
        /// Redis URL, e.g. `"redis://replica1.example.com:6379"`.
        url: String,
        /// Key prefix isolating this store's keys, e.g. `"store:"`.
        #[serde(default)]
        key_prefix: Option<String>,
    },
}

impl ConnectionConfig {
    /// Build a client handle for this backend.
    ///
    /// Construction is cheap and does not touch the network — backends
    /// connect lazily on first use. The only failure here is a malformed
    /// connection string.
    pub fn build(&self) -> StoreResult<Arc<dyn DocumentStoreClient>> {
        match self {
            ConnectionConfig::Memory => Ok(Arc::new(MemoryStore::new())),
            ConnectionConfig::Redis { url, key_prefix } => {
                let store = RedisStore::new(url, key_prefix.as_deref())?;
                Ok(Arc::new(store))
            }
        }
    }
}
