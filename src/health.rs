// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replica health monitoring.
//!
//! The monitor keeps one [`HealthRecord`] per registered replica fresh
//! by probing every replica concurrently on a recurring timer. A probe
//! is a one-document listing of the sentinel collection, bounded by the
//! operation timeout.
//!
//! # Tick Discipline
//!
//! All probes within a tick are launched together and the tick only
//! completes once every probe has settled; the next tick is scheduled
//! after that, so ticks never overlap regardless of how slow a replica
//! is.
//!
//! # Publishing
//!
//! The table is published through a `tokio::sync::watch` channel as an
//! immutable snapshot (`Arc<HashMap>`): readers either see the previous
//! complete table or the new one, never a partially-updated record.
//! [`snapshot()`](HealthMonitor::snapshot) never blocks on an in-flight
//! probe.
//!
//! The monitor records health; it never changes the primary. Failover
//! is driven by the executor and by explicit operator action (see
//! [`crate::election`]).

use crate::config::{CoordinatorSettings, ReplicaConfig};
use crate::metrics;
use crate::registry::ReplicaRegistry;
use crate::store::{DocumentStoreClient, ListOptions};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{watch, Mutex};
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Probe-driven state of one replica.
///
/// `Unknown` is the initial state before the first probe completes and
/// is treated as not-healthy for election purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaStatus {
    Unknown,
    Healthy,
    Unhealthy,
}

/// The latest probe result for one replica.
///
/// Records are replaced whole on every probe; no field is ever updated
/// in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub replica_name: String,
    pub status: ReplicaStatus,
    /// Probe round-trip in milliseconds. Meaningful only when healthy.
    pub response_time_ms: u64,
    /// Epoch milliseconds of the last probe; 0 until the first probe.
    pub last_checked_at: u64,
    /// Present only when unhealthy.
    pub last_error: Option<String>,
}

impl HealthRecord {
    /// The pre-first-probe record.
    pub fn unknown(replica_name: impl Into<String>) -> Self {
        Self {
            replica_name: replica_name.into(),
            status: ReplicaStatus::Unknown,
            response_time_ms: 0,
            last_checked_at: 0,
            last_error: None,
        }
    }

    pub fn healthy(replica_name: impl Into<String>, response_time_ms: u64) -> Self {
        Self {
            replica_name: replica_name.into(),
            status: ReplicaStatus::Healthy,
            response_time_ms,
            last_checked_at: epoch_millis(),
            last_error: None,
        }
    }

    pub fn unhealthy(replica_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            replica_name: replica_name.into(),
            status: ReplicaStatus::Unhealthy,
            response_time_ms: 0,
            last_checked_at: epoch_millis(),
            last_error: Some(error.into()),
        }
    }

    /// Only `Healthy` counts; `Unknown` does not.
    pub fn is_healthy(&self) -> bool {
        self.status == ReplicaStatus::Healthy
    }
}

/// Immutable snapshot of the whole health table, keyed by replica name.
pub type HealthTable = Arc<HashMap<String, HealthRecord>>;

/// Check whether a replica is healthy according to a table snapshot.
///
/// Absent records (which should not happen for registered replicas) are
/// treated as not-healthy.
pub fn is_healthy_in(table: &HealthTable, replica: &str) -> bool {
    table.get(replica).map(|r| r.is_healthy()).unwrap_or(false)
}

/// Shared state between the monitor handle and its probe task.
struct MonitorInner {
    registry: Arc<ReplicaRegistry>,
    interval: Duration,
    probe_timeout: Duration,
    sentinel: String,
    table_tx: watch::Sender<HealthTable>,
    table_rx: watch::Receiver<HealthTable>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Periodic health prober for the whole fleet.
///
/// Owns its timer task and shutdown handle; nothing runs until
/// [`start()`](Self::start).
pub struct HealthMonitor {
    inner: Arc<MonitorInner>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl HealthMonitor {
    /// Create a monitor with every replica in the `Unknown` state.
    pub fn new(registry: Arc<ReplicaRegistry>, settings: &CoordinatorSettings) -> Arc<Self> {
        let initial: HashMap<String, HealthRecord> = registry
            .all()
            .iter()
            .map(|r| (r.name.clone(), HealthRecord::unknown(&r.name)))
            .collect();

        let (table_tx, table_rx) = watch::channel(Arc::new(initial));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Arc::new(Self {
            inner: Arc::new(MonitorInner {
                registry,
                interval: settings.health_check_interval(),
                probe_timeout: settings.operation_timeout(),
                sentinel: settings.sentinel_collection.clone(),
                table_tx,
                table_rx,
                shutdown_rx,
            }),
            shutdown_tx,
            task: Mutex::new(None),
        })
    }

    /// Spawn the probe loop: one pass per `health_check_interval`.
    ///
    /// The startup path runs [`run_probe_pass()`](Self::run_probe_pass)
    /// before spawning the loop, so the loop's first tick is consumed
    /// rather than probing twice back-to-back. Idempotent while already
    /// running.
    pub async fn start(&self) {
        let mut guard = self.task.lock().await;
        if guard.is_some() {
            return;
        }

        info!(
            interval_ms = self.inner.interval.as_millis() as u64,
            timeout_ms = self.inner.probe_timeout.as_millis() as u64,
            replicas = self.inner.registry.len(),
            "Starting health monitor"
        );

        let inner = Arc::clone(&self.inner);
        *guard = Some(tokio::spawn(async move { inner.run().await }));
    }

    /// Signal the loop to stop and wait for it. Safe to call multiple
    /// times; used only at process teardown.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.task.lock().await.take() {
            if handle.await.is_err() {
                warn!("Health monitor task panicked during shutdown");
            }
        }
        debug!("Health monitor stopped");
    }

    /// The latest committed table. Never blocks on an in-flight probe.
    pub fn snapshot(&self) -> HealthTable {
        self.inner.table_rx.borrow().clone()
    }

    /// Push-based subscription for dashboards and ops tooling.
    pub fn subscribe(&self) -> watch::Receiver<HealthTable> {
        self.inner.table_rx.clone()
    }

    /// Overwrite one replica's record as unhealthy.
    ///
    /// Called by the query executor after exhausting retries, so the
    /// next election skips the replica without waiting for the next
    /// probe tick.
    pub fn mark_unhealthy(&self, replica: &str, reason: &str) {
        self.inner.mark_unhealthy(replica, reason);
    }

    /// Probe every replica concurrently and publish the new table.
    ///
    /// Exposed so tests (and the coordinator's startup path and manual
    /// "check now" action) can drive a deterministic pass without the
    /// timer.
    pub async fn run_probe_pass(&self) -> HealthTable {
        self.inner.run_probe_pass().await
    }

    /// Probe one replica with a cheap bounded read.
    pub async fn probe(&self, replica: &ReplicaConfig) -> HealthRecord {
        self.inner.probe(replica).await
    }
}

impl MonitorInner {
    async fn run(&self) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut timer = tokio::time::interval(self.interval);
        // A slow pass delays the next tick instead of bursting.
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The interval's first tick completes immediately; the caller
        // already ran the initial pass.
        timer.tick().await;

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.run_probe_pass().await;
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        debug!("Health monitor loop stopping");
                        break;
                    }
                }
            }
        }
    }

    async fn run_probe_pass(&self) -> HealthTable {
        let replicas = self.registry.all();
        let records = join_all(replicas.iter().map(|r| self.probe(r))).await;

        let healthy = records.iter().filter(|r| r.is_healthy()).count();
        let table: HealthTable = Arc::new(
            records
                .into_iter()
                .map(|r| (r.replica_name.clone(), r))
                .collect(),
        );

        metrics::set_healthy_replicas(healthy);
        debug!(healthy, total = replicas.len(), "Probe pass complete");

        let _ = self.table_tx.send(table.clone());
        table
    }

    /// Every outcome becomes a complete replacement record: a timeout is
    /// an unhealthy record with error `"timeout"`, any other failure an
    /// unhealthy record carrying the error message.
    async fn probe(&self, replica: &ReplicaConfig) -> HealthRecord {
        let client = match self.registry.client_for(&replica.name) {
            Ok(client) => client,
            Err(e) => {
                metrics::record_probe(&replica.name, false);
                return HealthRecord::unhealthy(&replica.name, e.to_string());
            }
        };

        let start = Instant::now();
        let listing = client.list_documents(&self.sentinel, ListOptions::default().with_limit(1));

        let record = match timeout(self.probe_timeout, listing).await {
            Ok(Ok(_)) => {
                let elapsed = start.elapsed();
                metrics::record_probe_latency(&replica.name, elapsed);
                HealthRecord::healthy(&replica.name, elapsed.as_millis() as u64)
            }
            Ok(Err(e)) => {
                warn!(replica = %replica.name, error = %e, "Health probe failed");
                HealthRecord::unhealthy(&replica.name, e.to_string())
            }
            Err(_) => {
                warn!(
                    replica = %replica.name,
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "Health probe timed out"
                );
                HealthRecord::unhealthy(&replica.name, "timeout")
            }
        };

        metrics::record_probe(&replica.name, record.is_healthy());
        metrics::set_replica_health(&replica.name, record.is_healthy());
        record
    }

    fn mark_unhealthy(&self, replica: &str, reason: &str) {
        let record = HealthRecord::unhealthy(replica, reason);
        self.table_tx.send_modify(|table| {
            let map = Arc::make_mut(table);
            map.insert(replica.to_string(), record);
        });
        metrics::set_replica_health(replica, false);
    }
}

/// Get current epoch milliseconds.
fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CoordinatorConfig, CoordinatorSettings, ReplicaConfig};
    use crate::store::MemoryStore;

    fn test_monitor() -> (Arc<ReplicaRegistry>, Arc<HealthMonitor>) {
        let config = CoordinatorConfig::for_testing();
        let registry = Arc::new(ReplicaRegistry::new(config.replicas).unwrap());
        let monitor = HealthMonitor::new(Arc::clone(&registry), &config.settings);
        (registry, monitor)
    }

    #[test]
    fn test_record_constructors() {
        let unknown = HealthRecord::unknown("primary");
        assert_eq!(unknown.status, ReplicaStatus::Unknown);
        assert_eq!(unknown.last_checked_at, 0);
        assert!(!unknown.is_healthy());

        let healthy = HealthRecord::healthy("primary", 12);
        assert!(healthy.is_healthy());
        assert_eq!(healthy.response_time_ms, 12);
        assert!(healthy.last_error.is_none());
        assert!(healthy.last_checked_at > 0);

        let unhealthy = HealthRecord::unhealthy("primary", "timeout");
        assert!(!unhealthy.is_healthy());
        assert_eq!(unhealthy.last_error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_initial_table_all_unknown() {
        let (_registry, monitor) = test_monitor();
        let table = monitor.snapshot();

        assert_eq!(table.len(), 3);
        assert!(table.values().all(|r| r.status == ReplicaStatus::Unknown));
        assert!(!is_healthy_in(&table, "primary"));
    }

    #[tokio::test]
    async fn test_probe_pass_marks_memory_replicas_healthy() {
        let (_registry, monitor) = test_monitor();
        let table = monitor.run_probe_pass().await;

        assert_eq!(table.len(), 3);
        for name in ["primary", "secondary", "tertiary"] {
            let record = &table[name];
            assert!(record.is_healthy(), "{} should be healthy", name);
            assert!(record.last_checked_at > 0);
            assert!(record.last_error.is_none());
        }
    }

    #[tokio::test]
    async fn test_probe_single_replica() {
        let (registry, monitor) = test_monitor();
        let replica = registry.get("primary").unwrap().clone();

        let record = monitor.probe(&replica).await;
        assert_eq!(record.replica_name, "primary");
        assert!(record.is_healthy());
    }

    #[tokio::test]
    async fn test_probe_offline_replica_unhealthy() {
        let (registry, monitor) = test_monitor();

        let store = Arc::new(MemoryStore::new());
        store.set_offline(true);
        registry.install_client("secondary", store);

        let table = monitor.run_probe_pass().await;
        assert!(is_healthy_in(&table, "primary"));
        assert!(!is_healthy_in(&table, "secondary"));
        assert!(table["secondary"]
            .last_error
            .as_deref()
            .unwrap()
            .contains("offline"));
    }

    #[tokio::test]
    async fn test_probe_records_fully_replaced() {
        let (registry, monitor) = test_monitor();

        let store = Arc::new(MemoryStore::new());
        registry.install_client("primary", store.clone());

        let first = monitor.run_probe_pass().await;
        assert!(is_healthy_in(&first, "primary"));

        store.set_offline(true);
        let second = monitor.run_probe_pass().await;
        let record = &second["primary"];
        assert!(!record.is_healthy());
        // The whole record flipped: error present, stale latency gone.
        assert!(record.last_error.is_some());
        assert_eq!(record.response_time_ms, 0);

        store.set_offline(false);
        let third = monitor.run_probe_pass().await;
        assert!(is_healthy_in(&third, "primary"));
        assert!(third["primary"].last_error.is_none());
    }

    #[tokio::test]
    async fn test_probe_is_idempotent_on_stable_replica() {
        let (_registry, monitor) = test_monitor();

        for _ in 0..5 {
            let table = monitor.run_probe_pass().await;
            assert!(is_healthy_in(&table, "primary"));
            assert_eq!(table.len(), 3);
        }
    }

    #[tokio::test]
    async fn test_mark_unhealthy_overwrites_record() {
        let (_registry, monitor) = test_monitor();
        monitor.run_probe_pass().await;
        assert!(is_healthy_in(&monitor.snapshot(), "primary"));

        monitor.mark_unhealthy("primary", "retries exhausted");
        let table = monitor.snapshot();
        assert!(!is_healthy_in(&table, "primary"));
        assert!(table["primary"]
            .last_error
            .as_deref()
            .unwrap()
            .contains("retries exhausted"));
    }

    #[tokio::test]
    async fn test_subscribe_sees_new_tables() {
        let (_registry, monitor) = test_monitor();
        let mut rx = monitor.subscribe();

        // Initial value is the all-unknown table.
        assert!(rx.borrow().values().all(|r| !r.is_healthy()));

        monitor.run_probe_pass().await;
        rx.changed().await.unwrap();
        assert!(is_healthy_in(&rx.borrow().clone(), "primary"));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let config = CoordinatorConfig {
            replicas: vec![ReplicaConfig::memory("only", 1)],
            settings: CoordinatorSettings {
                health_check_interval_ms: 10,
                operation_timeout_ms: 100,
                ..Default::default()
            },
        };
        let registry = Arc::new(ReplicaRegistry::new(config.replicas).unwrap());
        let monitor = HealthMonitor::new(registry, &config.settings);

        monitor.start().await;
        // Second start is a no-op, not a second loop.
        monitor.start().await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(is_healthy_in(&monitor.snapshot(), "only"));

        monitor.stop().await;
        monitor.stop().await; // idempotent
    }
}
