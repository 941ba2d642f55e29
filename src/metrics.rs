//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Health probe outcomes and latency
//! - Per-replica health state
//! - Primary elections and forced failovers
//! - Query execution (success, retries, failures)
//! - Write fan-out outcomes
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `coordinator_` and follow Prometheus
//! conventions: counters end in `_total`, gauges represent current
//! state, histograms track distributions.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a health probe outcome.
pub fn record_probe(replica: &str, healthy: bool) {
    let status = if healthy { "healthy" } else { "unhealthy" };
    counter!("coordinator_probes_total", "replica" => replica.to_string(), "status" => status)
        .increment(1);
}

/// Record health probe round-trip latency.
pub fn record_probe_latency(replica: &str, latency: Duration) {
    histogram!("coordinator_probe_latency_seconds", "replica" => replica.to_string())
        .record(latency.as_secs_f64());
}

/// Set the current health gauge for one replica (1 = healthy).
pub fn set_replica_health(replica: &str, healthy: bool) {
    gauge!("coordinator_replica_healthy", "replica" => replica.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

/// Set the count of currently-healthy replicas.
pub fn set_healthy_replicas(count: usize) {
    gauge!("coordinator_healthy_replicas").set(count as f64);
}

/// Record a primary election result.
pub fn record_primary_elected(replica: &str) {
    counter!("coordinator_primary_elections_total", "replica" => replica.to_string()).increment(1);
}

/// Record an operator-forced failover.
pub fn record_forced_failover(from: Option<&str>, to: &str) {
    counter!(
        "coordinator_forced_failovers_total",
        "from" => from.unwrap_or("none").to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

/// Record a completed query (after any retries).
pub fn record_query(replica: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("coordinator_queries_total", "replica" => replica.to_string(), "status" => status)
        .increment(1);
}

/// Record one retry within a query's attempt burst.
pub fn record_query_retry(replica: &str) {
    counter!("coordinator_query_retries_total", "replica" => replica.to_string()).increment(1);
}

/// Record a query that exhausted its retries.
pub fn record_query_failure(replica: &str) {
    counter!("coordinator_query_failures_total", "replica" => replica.to_string()).increment(1);
}

/// Record one fan-out branch outcome.
pub fn record_fanout(replica: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("coordinator_fanout_total", "replica" => replica.to_string(), "status" => status)
        .increment(1);
}

/// Record the coordinator lifecycle state by name.
pub fn set_coordinator_state(state: &str) {
    gauge!("coordinator_state", "state" => state.to_string()).set(1.0);
}
