// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Coordinator public surface.
//!
//! The main orchestrator that ties together:
//! - The replica fleet via [`crate::registry::ReplicaRegistry`]
//! - Probing via [`crate::health::HealthMonitor`]
//! - Sticky primary election via [`crate::election::PrimarySelector`]
//! - Retrying execution via [`crate::executor::QueryExecutor`]
//! - Write fan-out via [`crate::replicator::WriteReplicator`]
//!
//! # Architecture
//!
//! Repository code calls [`execute_read`](ReplicaCoordinator::execute_read)
//! / [`execute_write`](ReplicaCoordinator::execute_write) for everything
//! that must hit the primary, then
//! [`replicate_after_write`](ReplicaCoordinator::replicate_after_write)
//! once the primary has committed. The health monitor runs on its own
//! timer and is the only background work the coordinator owns.

mod types;

pub use types::{CoordinatorHealth, CoordinatorState};

use crate::config::CoordinatorConfig;
use crate::election::PrimarySelector;
use crate::error::{CoordinatorError, Result};
use crate::executor::QueryExecutor;
use crate::health::{HealthMonitor, HealthTable};
use crate::metrics;
use crate::registry::ReplicaRegistry;
use crate::replicator::{DocumentMutation, FanoutReport, WriteReplicator};
use crate::store::{DocumentStoreClient, ListOptions, StoreFuture};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// The multi-replica data-access coordinator.
///
/// Fans one logical document store out across independently-hosted
/// replicas: probes their health, elects a primary, executes operations
/// against it with retry and timeout, and propagates committed writes to
/// the rest best-effort.
///
/// # Example
///
/// ```rust,no_run
/// # async fn example() -> replica_coordinator::Result<()> {
/// use replica_coordinator::{CoordinatorConfig, ReplicaCoordinator};
/// use replica_coordinator::store::{DocumentStoreClient, ListOptions};
///
/// let coordinator = ReplicaCoordinator::new(CoordinatorConfig::for_testing())?;
/// coordinator.start().await?;
///
/// let products = coordinator
///     .execute_read(|client| {
///         Box::pin(async move {
///             client.list_documents("products", ListOptions::default()).await
///         })
///     })
///     .await?;
/// # let _ = products;
///
/// coordinator.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct ReplicaCoordinator {
    registry: Arc<ReplicaRegistry>,
    monitor: Arc<HealthMonitor>,
    selector: Arc<PrimarySelector>,
    executor: QueryExecutor,
    replicator: WriteReplicator,
    state_tx: watch::Sender<CoordinatorState>,
    state_rx: watch::Receiver<CoordinatorState>,
}

impl ReplicaCoordinator {
    /// Build the coordinator from configuration.
    ///
    /// Validates the replica fleet (duplicate names, empty list) but
    /// touches no network: clients connect lazily, and probing begins
    /// with [`start()`](Self::start).
    pub fn new(config: CoordinatorConfig) -> Result<Self> {
        let registry = Arc::new(ReplicaRegistry::new(config.replicas)?);
        let monitor = HealthMonitor::new(Arc::clone(&registry), &config.settings);
        let selector = Arc::new(PrimarySelector::new(
            Arc::clone(&registry),
            monitor.subscribe(),
        ));

        let executor = QueryExecutor::new(
            Arc::clone(&registry),
            Arc::clone(&selector),
            Arc::clone(&monitor),
            config.settings.operation_timeout(),
            config.settings.max_retries,
        );
        let replicator = WriteReplicator::new(
            Arc::clone(&registry),
            Arc::clone(&selector),
            monitor.subscribe(),
            config.settings.operation_timeout(),
        );

        let (state_tx, state_rx) = watch::channel(CoordinatorState::Created);

        Ok(Self {
            registry,
            monitor,
            selector,
            executor,
            replicator,
            state_tx,
            state_rx,
        })
    }

    /// Start the coordinator.
    ///
    /// Runs one probe pass so the table is fresh when this returns, then
    /// spawns the recurring probe loop and attempts an initial election.
    /// An all-unhealthy fleet is not fatal — the coordinator starts
    /// degraded and elects on first use.
    pub async fn start(&self) -> Result<()> {
        if self.state() != CoordinatorState::Created {
            return Err(CoordinatorError::InvalidState {
                expected: "Created".to_string(),
                actual: self.state().to_string(),
            });
        }

        info!(replicas = self.registry.len(), "Starting replica coordinator");

        self.monitor.run_probe_pass().await;
        self.monitor.start().await;

        match self.selector.current_or_elect().await {
            Ok(primary) => info!(primary = %primary, "Initial primary elected"),
            Err(_) => info!("No healthy replica yet, starting degraded"),
        }

        let _ = self.state_tx.send(CoordinatorState::Running);
        metrics::set_coordinator_state("Running");
        info!("Replica coordinator running");
        Ok(())
    }

    /// Shut the coordinator down. Idempotent and safe from any state.
    pub async fn shutdown(&self) {
        if self.state() == CoordinatorState::Stopped {
            return;
        }
        info!("Shutting down replica coordinator");
        let _ = self.state_tx.send(CoordinatorState::ShuttingDown);
        metrics::set_coordinator_state("ShuttingDown");

        self.monitor.stop().await;

        let _ = self.state_tx.send(CoordinatorState::Stopped);
        metrics::set_coordinator_state("Stopped");
        info!("Replica coordinator stopped");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CoordinatorState {
        *self.state_rx.borrow()
    }

    /// Watch lifecycle state changes.
    pub fn state_receiver(&self) -> watch::Receiver<CoordinatorState> {
        self.state_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state() == CoordinatorState::Running
    }

    // =========================================================================
    // Query surface
    // =========================================================================

    /// Run a read against the current primary with retry and timeout.
    pub async fn execute_read<T, F>(&self, op: F) -> Result<T>
    where
        F: Fn(Arc<dyn DocumentStoreClient>) -> StoreFuture<'static, T>,
        T: Send,
    {
        self.executor.execute(op).await
    }

    /// Run a write against the current primary with retry and timeout.
    ///
    /// Identical mechanics to [`execute_read`](Self::execute_read); the
    /// separate name keeps call sites honest about which operations need
    /// a follow-up [`replicate_after_write`](Self::replicate_after_write).
    pub async fn execute_write<T, F>(&self, op: F) -> Result<T>
    where
        F: Fn(Arc<dyn DocumentStoreClient>) -> StoreFuture<'static, T>,
        T: Send,
    {
        self.executor.execute(op).await
    }

    /// Fan a mutation that already committed on the primary out to the
    /// healthy secondaries. Never fails; see [`FanoutReport`].
    pub async fn replicate_after_write(&self, mutation: DocumentMutation) -> FanoutReport {
        self.replicator.replicate(mutation).await
    }

    /// Fan a delete out to the healthy secondaries.
    pub async fn delete_from_replicas(
        &self,
        collection: &str,
        document_id: &str,
    ) -> FanoutReport {
        self.replicator
            .delete_from_replicas(collection, document_id)
            .await
    }

    // =========================================================================
    // Operations surface
    // =========================================================================

    /// Push-based health table subscription for dashboards.
    pub fn health_status(&self) -> watch::Receiver<HealthTable> {
        self.monitor.subscribe()
    }

    /// Probe every replica immediately, outside the regular cadence.
    ///
    /// Backs the dashboard's "check now" action; returns the freshly
    /// committed table.
    pub async fn probe_now(&self) -> HealthTable {
        self.monitor.run_probe_pass().await
    }

    /// The latest committed health table. Never blocks.
    pub fn health_snapshot(&self) -> HealthTable {
        self.monitor.snapshot()
    }

    /// The last elected primary, without triggering an election.
    pub async fn current_primary(&self) -> Option<String> {
        self.selector.current().await
    }

    /// Switch the primary away from the incumbent, even if healthy.
    /// Returns the new primary's name.
    pub async fn force_failover(&self) -> Result<String> {
        self.selector.force_failover().await
    }

    /// Document count in one collection on one specific replica.
    ///
    /// Bypasses election deliberately — replica-by-replica counts are
    /// how divergence shows up on the sync dashboard.
    pub async fn collection_count(&self, replica: &str, collection: &str) -> Result<usize> {
        let client = self.registry.client_for(replica)?;
        let docs = client
            .list_documents(collection, ListOptions::default())
            .await
            .map_err(|e| CoordinatorError::unreachable(replica, e.to_string()))?;
        Ok(docs.len())
    }

    /// Aggregate health summary for ops endpoints. No network I/O.
    pub async fn health_check(&self) -> CoordinatorHealth {
        let table = self.monitor.snapshot();
        let mut replicas: Vec<_> = table.values().cloned().collect();
        replicas.sort_by(|a, b| a.replica_name.cmp(&b.replica_name));

        let replicas_healthy = replicas.iter().filter(|r| r.is_healthy()).count();
        let state = self.state();

        CoordinatorHealth {
            state: state.to_string(),
            ready: state == CoordinatorState::Running && replicas_healthy > 0,
            current_primary: self.selector.current().await,
            replicas_healthy,
            replicas_total: replicas.len(),
            replicas,
        }
    }

    /// The replica registry (for repository helpers and diagnostics).
    pub fn registry(&self) -> &Arc<ReplicaRegistry> {
        &self.registry
    }
}
