//! Domain repositories for the storefront catalog.
//!
//! Thin read/write helpers for the `products` and `categories`
//! collections, built on the coordinator's public surface. Reads go
//! through [`execute_read`](crate::ReplicaCoordinator::execute_read);
//! writes commit on the primary through
//! [`execute_write`](crate::ReplicaCoordinator::execute_write) and then
//! fan out via
//! [`replicate_after_write`](crate::ReplicaCoordinator::replicate_after_write).
//!
//! Catalog queries (category filter, text search) are evaluated in
//! process over a bounded fetch: the catalog is small and the stores
//! only support equality filters, so the repository fetches up to
//! [`SCAN_LIMIT`] ordered documents and filters/paginates locally.

use crate::coordinator::ReplicaCoordinator;
use crate::error::Result;
use crate::replicator::DocumentMutation;
use crate::store::{Document, DocumentStoreClient, ListOptions, OrderBy};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Collection names used by the storefront.
pub const PRODUCTS_COLLECTION: &str = "products";
pub const CATEGORIES_COLLECTION: &str = "categories";

/// Upper bound on documents fetched for client-side filtering.
pub const SCAN_LIMIT: usize = 1000;

// ═══════════════════════════════════════════════════════════════════════════════
// Models
// ═══════════════════════════════════════════════════════════════════════════════

/// Stock status of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductStatus {
    Active,
    Inactive,
    OutOfStock,
}

/// A catalog product.
///
/// The `id` lives outside the stored payload (it is the document id);
/// `created_at`/`updated_at` are epoch milliseconds stamped by the
/// repository, never by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    /// Category slug.
    pub category: String,
    pub brand: String,
    pub sku: String,
    pub stock: u32,
    pub status: ProductStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub rating: f64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Product {
    /// Deserialize a stored document, injecting the document id.
    /// Returns `None` for payloads that don't parse as a product.
    pub fn from_document(doc: Document) -> Option<Self> {
        let mut product: Product = serde_json::from_value(doc.data).ok()?;
        product.id = doc.id;
        Some(product)
    }

    fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.name.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&query))
    }
}

/// Caller-supplied fields for a new product. The repository owns the id
/// and the timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub brand: String,
    pub sku: String,
    pub stock: u32,
    pub status: ProductStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub rating: f64,
}

/// A catalog category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i64,
}

fn default_true() -> bool {
    true
}

impl Category {
    pub fn from_document(doc: Document) -> Option<Self> {
        let mut category: Category = serde_json::from_value(doc.data).ok()?;
        category.id = doc.id;
        Some(category)
    }
}

/// Search parameters for product listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Free-text search over name, description, and tags.
    #[serde(default)]
    pub query: Option<String>,
    /// Category slug filter.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub limit: usize,
    /// Sort field; defaults to newest-first when absent.
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub descending: bool,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    12
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: None,
            category: None,
            page: 1,
            limit: 12,
            sort_by: None,
            descending: false,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ProductRepository
// ═══════════════════════════════════════════════════════════════════════════════

/// Product reads and replicated writes.
pub struct ProductRepository {
    coordinator: Arc<ReplicaCoordinator>,
}

impl ProductRepository {
    pub fn new(coordinator: Arc<ReplicaCoordinator>) -> Self {
        Self { coordinator }
    }

    /// List products with filtering, search, and pagination.
    pub async fn list(&self, params: SearchParams) -> Result<SearchResult<Product>> {
        let order = match params.sort_by.as_deref() {
            Some(field) => OrderBy {
                field: field.to_string(),
                descending: params.descending,
            },
            None => OrderBy::desc("created_at"),
        };
        let options = ListOptions::default().with_order(order).with_limit(SCAN_LIMIT);

        let docs = self
            .coordinator
            .execute_read(move |client| {
                let options = options.clone();
                Box::pin(async move { client.list_documents(PRODUCTS_COLLECTION, options).await })
            })
            .await?;

        let mut products: Vec<Product> =
            docs.into_iter().filter_map(Product::from_document).collect();

        if let Some(ref category) = params.category {
            products.retain(|p| &p.category == category);
        }
        if let Some(ref query) = params.query {
            products.retain(|p| p.matches_query(query));
        }

        let total = products.len();
        let page = params.page.max(1);
        let start = (page - 1) * params.limit;
        let end = (start + params.limit).min(total);
        let items = if start < total {
            products[start..end].to_vec()
        } else {
            Vec::new()
        };

        debug!(total, page, returned = items.len(), "Product listing");

        Ok(SearchResult {
            items,
            total,
            page,
            limit: params.limit,
            has_next: end < total,
            has_prev: page > 1,
        })
    }

    /// Featured products, best-rated first.
    pub async fn featured(&self, limit: usize) -> Result<Vec<Product>> {
        let docs = self
            .coordinator
            .execute_read(move |client| {
                let options = ListOptions::default()
                    .with_filter("featured", json!(true))
                    .with_order(OrderBy::desc("rating"))
                    .with_limit(limit);
                Box::pin(async move { client.list_documents(PRODUCTS_COLLECTION, options).await })
            })
            .await?;

        Ok(docs.into_iter().filter_map(Product::from_document).collect())
    }

    /// Fetch one product by id.
    pub async fn get(&self, id: &str) -> Result<Option<Product>> {
        let id = id.to_string();
        let doc = self
            .coordinator
            .execute_read(move |client| {
                let id = id.clone();
                Box::pin(async move { client.get_document(PRODUCTS_COLLECTION, &id).await })
            })
            .await?;
        Ok(doc.and_then(Product::from_document))
    }

    /// Create a product on the primary, then fan it out. Returns the
    /// generated id.
    pub async fn create(&self, draft: ProductDraft) -> Result<String> {
        let now = epoch_millis();
        let mut data = serde_json::to_value(&draft)
            .expect("product draft serializes to an object");
        if let Some(obj) = data.as_object_mut() {
            obj.insert("created_at".to_string(), json!(now));
            obj.insert("updated_at".to_string(), json!(now));
        }

        let payload = data.clone();
        let id = self
            .coordinator
            .execute_write(move |client| {
                let data = data.clone();
                Box::pin(async move { client.create_document(PRODUCTS_COLLECTION, data).await })
            })
            .await?;

        self.coordinator
            .replicate_after_write(DocumentMutation::create(PRODUCTS_COLLECTION, &id, payload))
            .await;

        Ok(id)
    }

    /// Patch a product on the primary, then fan the patch out.
    ///
    /// `updated_at` is refreshed; `created_at` is never touched.
    pub async fn update(&self, id: &str, mut patch: Value) -> Result<()> {
        if let Some(obj) = patch.as_object_mut() {
            obj.remove("created_at");
            obj.insert("updated_at".to_string(), json!(epoch_millis()));
        }

        let id_owned = id.to_string();
        let patch_for_primary = patch.clone();
        self.coordinator
            .execute_write(move |client| {
                let id = id_owned.clone();
                let patch = patch_for_primary.clone();
                Box::pin(async move {
                    client.update_document(PRODUCTS_COLLECTION, &id, patch).await
                })
            })
            .await?;

        self.coordinator
            .replicate_after_write(DocumentMutation::update(PRODUCTS_COLLECTION, id, patch))
            .await;

        Ok(())
    }

    /// Delete a product from the primary, then from the secondaries.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let id_owned = id.to_string();
        self.coordinator
            .execute_write(move |client| {
                let id = id_owned.clone();
                Box::pin(async move { client.delete_document(PRODUCTS_COLLECTION, &id).await })
            })
            .await?;

        self.coordinator
            .delete_from_replicas(PRODUCTS_COLLECTION, id)
            .await;

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CategoryRepository
// ═══════════════════════════════════════════════════════════════════════════════

/// Category reads and replicated writes.
pub struct CategoryRepository {
    coordinator: Arc<ReplicaCoordinator>,
}

impl CategoryRepository {
    pub fn new(coordinator: Arc<ReplicaCoordinator>) -> Self {
        Self { coordinator }
    }

    /// All categories, by ascending sort order.
    pub async fn list(&self) -> Result<Vec<Category>> {
        let docs = self
            .coordinator
            .execute_read(|client| {
                let options = ListOptions::default().with_order(OrderBy::asc("sort_order"));
                Box::pin(async move {
                    client.list_documents(CATEGORIES_COLLECTION, options).await
                })
            })
            .await?;

        Ok(docs.into_iter().filter_map(Category::from_document).collect())
    }

    /// Look a category up by its slug.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let slug_owned = slug.to_string();
        let docs = self
            .coordinator
            .execute_read(move |client| {
                let options =
                    ListOptions::default().with_filter("slug", json!(slug_owned.clone()));
                Box::pin(async move {
                    client.list_documents(CATEGORIES_COLLECTION, options).await
                })
            })
            .await?;

        Ok(docs.into_iter().next().and_then(Category::from_document))
    }

    /// Create a category on the primary, then fan it out.
    pub async fn create(&self, category: &Category) -> Result<String> {
        let data = serde_json::to_value(category)
            .expect("category serializes to an object");

        let payload = data.clone();
        let id = self
            .coordinator
            .execute_write(move |client| {
                let data = data.clone();
                Box::pin(async move { client.create_document(CATEGORIES_COLLECTION, data).await })
            })
            .await?;

        self.coordinator
            .replicate_after_write(DocumentMutation::create(
                CATEGORIES_COLLECTION,
                &id,
                payload,
            ))
            .await;

        Ok(id)
    }

    /// Patch a category on the primary, then fan the patch out.
    pub async fn update(&self, id: &str, patch: Value) -> Result<()> {
        let id_owned = id.to_string();
        let patch_for_primary = patch.clone();
        self.coordinator
            .execute_write(move |client| {
                let id = id_owned.clone();
                let patch = patch_for_primary.clone();
                Box::pin(async move {
                    client
                        .update_document(CATEGORIES_COLLECTION, &id, patch)
                        .await
                })
            })
            .await?;

        self.coordinator
            .replicate_after_write(DocumentMutation::update(CATEGORIES_COLLECTION, id, patch))
            .await;

        Ok(())
    }

    /// Delete a category from the primary, then from the secondaries.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let id_owned = id.to_string();
        self.coordinator
            .execute_write(move |client| {
                let id = id_owned.clone();
                Box::pin(async move { client.delete_document(CATEGORIES_COLLECTION, &id).await })
            })
            .await?;

        self.coordinator
            .delete_from_replicas(CATEGORIES_COLLECTION, id)
            .await;

        Ok(())
    }
}

/// Get current epoch milliseconds.
fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
