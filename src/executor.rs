// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query execution against the current primary.
//!
//! The executor is the single chokepoint every read and the primary-side
//! half of every write pass through. One call:
//!
//! 1. Resolves the primary **once** via the sticky selector (propagating
//!    [`NoHealthyReplica`](crate::CoordinatorError::NoHealthyReplica)
//!    without touching any store).
//! 2. Runs the caller's operation under the operation timeout.
//! 3. On failure or timeout, retries against the **same** resolved
//!    primary — no mid-burst re-election, so a transient blip does not
//!    thrash the primary role.
//! 4. After `1 + max_retries` failed attempts, marks the primary
//!    unhealthy (the next call re-elects — this is the lazy failover
//!    path) and surfaces
//!    [`QueryFailed`](crate::CoordinatorError::QueryFailed) wrapping the
//!    last error.
//!
//! A timed-out attempt's underlying future is dropped; if the network
//! call completes anyway, its result is discarded. Starting a new query
//! never cancels an in-flight one.

use crate::election::PrimarySelector;
use crate::error::{CoordinatorError, Result};
use crate::health::HealthMonitor;
use crate::metrics;
use crate::registry::ReplicaRegistry;
use crate::store::{DocumentStoreClient, StoreFuture};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs caller-supplied operations against the elected primary with
/// timeout and bounded retry.
pub struct QueryExecutor {
    registry: Arc<ReplicaRegistry>,
    selector: Arc<PrimarySelector>,
    monitor: Arc<HealthMonitor>,
    operation_timeout: Duration,
    max_retries: u32,
}

impl QueryExecutor {
    pub fn new(
        registry: Arc<ReplicaRegistry>,
        selector: Arc<PrimarySelector>,
        monitor: Arc<HealthMonitor>,
        operation_timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            registry,
            selector,
            monitor,
            operation_timeout,
            max_retries,
        }
    }

    /// Execute `op` against the current primary.
    ///
    /// The closure is invoked once per attempt with the primary's client
    /// handle and must return a boxed future owning everything it needs.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # async fn example(executor: &replica_coordinator::executor::QueryExecutor)
    /// #     -> replica_coordinator::Result<()> {
    /// use replica_coordinator::store::{DocumentStoreClient, ListOptions};
    ///
    /// let products = executor
    ///     .execute(|client| {
    ///         Box::pin(async move {
    ///             client.list_documents("products", ListOptions::default()).await
    ///         })
    ///     })
    ///     .await?;
    /// # let _ = products;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn execute<T, F>(&self, op: F) -> Result<T>
    where
        F: Fn(Arc<dyn DocumentStoreClient>) -> StoreFuture<'static, T>,
        T: Send,
    {
        let primary = self.selector.current_or_elect().await?;

        let client = match self.registry.client_for(&primary) {
            Ok(client) => client,
            Err(e) => {
                // Client construction failed: nothing to retry against.
                self.monitor.mark_unhealthy(&primary, &e.to_string());
                metrics::record_query_failure(&primary);
                return Err(CoordinatorError::QueryFailed {
                    replica: primary,
                    attempts: 1,
                    source: Box::new(e),
                });
            }
        };

        let attempts = self.max_retries + 1;
        let mut last_error = CoordinatorError::unreachable(&primary, "no attempt made");

        for attempt in 1..=attempts {
            match timeout(self.operation_timeout, op(client.clone())).await {
                Ok(Ok(value)) => {
                    if attempt > 1 {
                        debug!(replica = %primary, attempt, "Query succeeded after retry");
                    }
                    metrics::record_query(&primary, true);
                    return Ok(value);
                }
                Ok(Err(e)) => {
                    warn!(replica = %primary, attempt, error = %e, "Query attempt failed");
                    last_error = CoordinatorError::unreachable(&primary, e.to_string());
                }
                Err(_) => {
                    warn!(
                        replica = %primary,
                        attempt,
                        timeout_ms = self.operation_timeout.as_millis() as u64,
                        "Query attempt timed out"
                    );
                    last_error = CoordinatorError::OperationTimeout {
                        replica: primary.clone(),
                        timeout_ms: self.operation_timeout.as_millis() as u64,
                    };
                }
            }

            if attempt < attempts {
                metrics::record_query_retry(&primary);
            }
        }

        // Retries exhausted: record the failure so the next call
        // re-elects instead of hammering the same replica.
        self.monitor
            .mark_unhealthy(&primary, &format!("retries exhausted: {}", last_error));
        metrics::record_query(&primary, false);
        metrics::record_query_failure(&primary);

        Err(CoordinatorError::QueryFailed {
            replica: primary,
            attempts,
            source: Box::new(last_error),
        })
    }
}
