// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Best-effort write fan-out.
//!
//! After a write has committed on the primary (through the query
//! executor), the replicator re-applies the same mutation to every other
//! currently-healthy replica. Branches are launched together and joined
//! with per-branch error isolation: one replica failing, hanging, or
//! being mid-restart never cancels or delays delivery to the others.
//!
//! # Consistency Non-Guarantee
//!
//! This is leader-biased, asynchronous replication with no conflict
//! resolution and no retained queue. A secondary that misses a fan-out
//! write silently diverges from the primary until an operator runs a
//! full-collection sync, or until it wins an election while missing
//! data. The caller's write is considered durable once the primary
//! accepted it; branch failures are logged and recorded in the
//! [`FanoutReport`], never surfaced as errors.

use crate::election::PrimarySelector;
use crate::error::{CoordinatorError, Result};
use crate::health::{is_healthy_in, HealthTable};
use crate::metrics;
use crate::registry::ReplicaRegistry;
use crate::store::DocumentStoreClient;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// The kind of change being fanned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for MutationOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationOp::Create => write!(f, "create"),
            MutationOp::Update => write!(f, "update"),
            MutationOp::Delete => write!(f, "delete"),
        }
    }
}

/// A single document change, already committed on the primary.
///
/// Transient: built per write call, dropped once the fan-out settles.
#[derive(Debug, Clone)]
pub struct DocumentMutation {
    pub collection: String,
    pub document_id: String,
    pub op: MutationOp,
    /// Full document for `Create`, patch for `Update`, `None` for `Delete`.
    pub payload: Option<Value>,
}

impl DocumentMutation {
    pub fn create(collection: &str, document_id: &str, payload: Value) -> Self {
        Self {
            collection: collection.to_string(),
            document_id: document_id.to_string(),
            op: MutationOp::Create,
            payload: Some(payload),
        }
    }

    pub fn update(collection: &str, document_id: &str, patch: Value) -> Self {
        Self {
            collection: collection.to_string(),
            document_id: document_id.to_string(),
            op: MutationOp::Update,
            payload: Some(patch),
        }
    }

    pub fn delete(collection: &str, document_id: &str) -> Self {
        Self {
            collection: collection.to_string(),
            document_id: document_id.to_string(),
            op: MutationOp::Delete,
            payload: None,
        }
    }
}

/// Outcome of one fan-out call.
///
/// Informational only — the write already committed on the primary.
/// `failed` entries are the replicas that have silently diverged.
#[derive(Debug, Default)]
pub struct FanoutReport {
    /// Healthy non-primary replicas the fan-out targeted.
    pub attempted: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, CoordinatorError)>,
}

impl FanoutReport {
    /// True when every targeted replica received the mutation.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fans committed primary mutations out to the other healthy replicas.
pub struct WriteReplicator {
    registry: Arc<ReplicaRegistry>,
    selector: Arc<PrimarySelector>,
    health: watch::Receiver<HealthTable>,
    branch_timeout: Duration,
}

impl WriteReplicator {
    pub fn new(
        registry: Arc<ReplicaRegistry>,
        selector: Arc<PrimarySelector>,
        health: watch::Receiver<HealthTable>,
        branch_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            selector,
            health,
            branch_timeout,
        }
    }

    /// Re-apply a committed mutation to every healthy non-primary
    /// replica.
    ///
    /// Never fails: branch errors are caught, logged, and reported.
    pub async fn replicate(&self, mutation: DocumentMutation) -> FanoutReport {
        let table = self.health.borrow().clone();
        let primary = self.selector.current().await;

        let targets: Vec<String> = self
            .registry
            .all()
            .iter()
            .map(|r| r.name.clone())
            .filter(|name| Some(name.as_str()) != primary.as_deref())
            .filter(|name| is_healthy_in(&table, name))
            .collect();

        if targets.is_empty() {
            debug!(
                collection = %mutation.collection,
                document_id = %mutation.document_id,
                "No healthy secondaries, skipping fan-out"
            );
            return FanoutReport::default();
        }

        let branches = targets.into_iter().map(|replica| {
            let mutation = mutation.clone();
            async move {
                let result = self.apply_branch(&replica, &mutation).await;
                match result {
                    Ok(()) => {
                        debug!(
                            replica = %replica,
                            op = %mutation.op,
                            collection = %mutation.collection,
                            document_id = %mutation.document_id,
                            "Replicated mutation"
                        );
                        metrics::record_fanout(&replica, true);
                        (replica, Ok(()))
                    }
                    Err(e) => {
                        // Logged and dropped: the secondary diverges
                        // until the next manual sync.
                        warn!(
                            replica = %replica,
                            op = %mutation.op,
                            collection = %mutation.collection,
                            document_id = %mutation.document_id,
                            error = %e,
                            "Fan-out branch failed"
                        );
                        metrics::record_fanout(&replica, false);
                        (replica, Err(e))
                    }
                }
            }
        });

        let results = join_all(branches).await;

        let mut report = FanoutReport {
            attempted: results.len(),
            ..Default::default()
        };
        for (replica, result) in results {
            match result {
                Ok(()) => report.succeeded.push(replica),
                Err(e) => report.failed.push((replica, e)),
            }
        }

        if report.is_complete() {
            info!(
                op = %mutation.op,
                collection = %mutation.collection,
                document_id = %mutation.document_id,
                replicas = report.attempted,
                "Fan-out complete"
            );
        } else {
            warn!(
                op = %mutation.op,
                collection = %mutation.collection,
                document_id = %mutation.document_id,
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                "Fan-out partially failed"
            );
        }

        report
    }

    /// Fan a delete out to the secondaries.
    pub async fn delete_from_replicas(&self, collection: &str, document_id: &str) -> FanoutReport {
        self.replicate(DocumentMutation::delete(collection, document_id))
            .await
    }

    /// Apply one mutation to one replica, bounded by the branch timeout.
    async fn apply_branch(&self, replica: &str, mutation: &DocumentMutation) -> Result<()> {
        let client = self.registry.client_for(replica)?;

        let apply = async {
            match mutation.op {
                MutationOp::Create => {
                    let payload = mutation.payload.clone().ok_or_else(|| {
                        CoordinatorError::unreachable(replica, "create mutation without payload")
                    })?;
                    client
                        .upsert_document(&mutation.collection, &mutation.document_id, payload)
                        .await
                        .map_err(|e| CoordinatorError::unreachable(replica, e.to_string()))
                }
                MutationOp::Update => {
                    let patch = mutation.payload.clone().ok_or_else(|| {
                        CoordinatorError::unreachable(replica, "update mutation without payload")
                    })?;
                    client
                        .update_document(&mutation.collection, &mutation.document_id, patch)
                        .await
                        .map_err(|e| CoordinatorError::unreachable(replica, e.to_string()))
                }
                MutationOp::Delete => client
                    .delete_document(&mutation.collection, &mutation.document_id)
                    .await
                    .map_err(|e| CoordinatorError::unreachable(replica, e.to_string())),
            }
        };

        match timeout(self.branch_timeout, apply).await {
            Ok(result) => result,
            Err(_) => Err(CoordinatorError::OperationTimeout {
                replica: replica.to_string(),
                timeout_ms: self.branch_timeout.as_millis() as u64,
            }),
        }
    }
}
