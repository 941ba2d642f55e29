//! # Replica Coordinator
//!
//! A multi-replica data-access coordinator for a document-store-backed
//! storefront: one logical store fanned out across several
//! independently-hosted database instances.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                          replica-coordinator                             │
//! │                                                                          │
//! │  ┌────────────────┐     ┌───────────────┐     ┌───────────────────────┐  │
//! │  │ Repositories   │────►│ QueryExecutor │────►│ PrimarySelector       │  │
//! │  │ (products,     │     │ (timeout +    │     │ (sticky, lazy         │  │
//! │  │  categories)   │     │  retry)       │     │  failover)            │  │
//! │  └────────────────┘     └───────────────┘     └───────────────────────┘  │
//! │          │                                              │                │
//! │          ▼                                              ▼                │
//! │  ┌────────────────┐     ┌───────────────┐     ┌───────────────────────┐  │
//! │  │ WriteReplicator│     │ HealthMonitor │────►│ ReplicaRegistry       │  │
//! │  │ (fan-out,      │     │ (periodic     │     │ (lazy store clients)  │  │
//! │  │  error-isolated│     │  probes)      │     └───────────────────────┘  │
//! │  └────────────────┘     └───────────────┘                                │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every read, and the primary-side half of every write, goes through the
//! query executor against the currently-elected primary. After a write
//! commits on the primary, the replicator re-applies it to every other
//! healthy replica concurrently, absorbing per-replica failures.
//!
//! ## Consistency Model
//!
//! Best-effort, asynchronous, leader-biased replication: no conflict
//! resolution, no write-ahead log, no read-repair. A reader hitting a
//! secondary immediately after a write may observe stale data, and a
//! secondary that misses a fan-out diverges silently until a manual
//! sync. The user-visible write path cares only about primary
//! durability.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use replica_coordinator::{CoordinatorConfig, ReplicaCoordinator};
//! use replica_coordinator::config::ReplicaConfig;
//!
//! #[tokio::main]
//! async fn main() -> replica_coordinator::Result<()> {
//!     let config = CoordinatorConfig {
//!         replicas: vec![
//!             ReplicaConfig::redis("primary", 1, "redis://db1:6379"),
//!             ReplicaConfig::redis("secondary", 2, "redis://db2:6379"),
//!             ReplicaConfig::redis("tertiary", 3, "redis://db3:6379"),
//!         ],
//!         ..Default::default()
//!     };
//!
//!     let coordinator = ReplicaCoordinator::new(config)?;
//!     coordinator.start().await?;
//!
//!     // ... serve traffic ...
//!
//!     coordinator.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod election;
pub mod error;
pub mod executor;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod replicator;
pub mod repository;
pub mod store;

// Re-exports for convenience
pub use config::{CoordinatorConfig, CoordinatorSettings, ReplicaConfig};
pub use coordinator::{CoordinatorHealth, CoordinatorState, ReplicaCoordinator};
pub use election::PrimarySelector;
pub use error::{CoordinatorError, Result};
pub use health::{HealthMonitor, HealthRecord, HealthTable, ReplicaStatus};
pub use registry::ReplicaRegistry;
pub use replicator::{DocumentMutation, FanoutReport, MutationOp, WriteReplicator};
pub use repository::{CategoryRepository, Product, ProductRepository, SearchParams};
pub use store::{ConnectionConfig, Document, DocumentStoreClient, ListOptions};
