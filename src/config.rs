//! Configuration for the replica coordinator.
//!
//! Configuration is passed to
//! [`ReplicaCoordinator::new()`](crate::ReplicaCoordinator::new) and can
//! be constructed programmatically or deserialized from YAML/JSON.
//!
//! # Quick Start
//!
//! ```rust
//! use replica_coordinator::config::{CoordinatorConfig, ReplicaConfig};
//!
//! let config = CoordinatorConfig {
//!     replicas: vec![
//!         ReplicaConfig::redis("primary", 1, "redis://db1:6379"),
//!         ReplicaConfig::redis("secondary", 2, "redis://db2:6379"),
//!     ],
//!     ..Default::default()
//! };
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! CoordinatorConfig
//! ├── replicas: Vec<ReplicaConfig>   # name, priority, backend connection
//! └── settings: CoordinatorSettings
//!     ├── health_check_interval_ms   # probe cadence (default 30000)
//!     ├── operation_timeout_ms       # per-operation budget (default 5000)
//!     ├── max_retries                # retries after first attempt (default 3)
//!     └── sentinel_collection        # cheap collection probed for health
//! ```
//!
//! # YAML Example
//!
//! ```yaml
//! replicas:
//!   - name: "primary"
//!     priority: 1
//!     connection: { backend: "redis", url: "redis://db1:6379" }
//!   - name: "secondary"
//!     priority: 2
//!     connection: { backend: "redis", url: "redis://db2:6379" }
//!
//! settings:
//!   health_check_interval_ms: 30000
//!   operation_timeout_ms: 5000
//!   max_retries: 3
//! ```

use crate::store::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Top-level config: passed to ReplicaCoordinator::new()
// ═══════════════════════════════════════════════════════════════════════════════

/// The top-level config object passed to `ReplicaCoordinator::new()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// The replica fleet, in declaration order. Priority decides
    /// preference; declaration order does not.
    pub replicas: Vec<ReplicaConfig>,

    /// Tunables for probing, timeouts, and retry.
    #[serde(default)]
    pub settings: CoordinatorSettings,
}

impl CoordinatorConfig {
    /// Three memory-backed replicas (`primary`/`secondary`/`tertiary`,
    /// priorities 1/2/3) with a short operation timeout and a probe
    /// interval long enough that tests drive probe passes explicitly.
    pub fn for_testing() -> Self {
        Self {
            replicas: vec![
                ReplicaConfig::memory("primary", 1),
                ReplicaConfig::memory("secondary", 2),
                ReplicaConfig::memory("tertiary", 3),
            ],
            settings: CoordinatorSettings {
                health_check_interval_ms: 60_000,
                operation_timeout_ms: 500,
                max_retries: 2,
                sentinel_collection: default_sentinel_collection(),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ReplicaConfig: one entry per database instance
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for a single replica.
///
/// Immutable after load. The registry rejects duplicate names at
/// startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Unique replica identifier (for logging, election, and metrics).
    pub name: String,

    /// Election preference. Lower value = more preferred as primary.
    pub priority: u32,

    /// Backend connection, one variant per supported store.
    pub connection: ConnectionConfig,
}

impl ReplicaConfig {
    /// A memory-backed replica, for tests and standalone mode.
    pub fn memory(name: &str, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            connection: ConnectionConfig::Memory,
        }
    }

    /// A Redis-backed replica.
    pub fn redis(name: &str, priority: u32, url: &str) -> Self {
        Self {
            name: name.to_string(),
            priority,
            connection: ConnectionConfig::Redis {
                url: url.to_string(),
                key_prefix: None,
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CoordinatorSettings: probe, timeout, and retry tunables
// ═══════════════════════════════════════════════════════════════════════════════

/// Tunable parameters for the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorSettings {
    /// How often the health monitor probes every replica (ms).
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,

    /// Per-operation time budget (ms). Applies to every executor
    /// attempt, every health probe, and every fan-out branch.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// Retries after the first attempt before a query fails.
    /// The executor makes `1 + max_retries` attempts in total.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Collection probed by health checks. A one-document listing of
    /// this collection is the cheapest read the storefront supports.
    #[serde(default = "default_sentinel_collection")]
    pub sentinel_collection: String,
}

fn default_health_check_interval_ms() -> u64 {
    30_000
}

fn default_operation_timeout_ms() -> u64 {
    5_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_sentinel_collection() -> String {
    "products".to_string()
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            health_check_interval_ms: 30_000,
            operation_timeout_ms: 5_000,
            max_retries: 3,
            sentinel_collection: "products".to_string(),
        }
    }
}

impl CoordinatorSettings {
    /// Probe cadence as a Duration.
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    /// Per-operation budget as a Duration.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}
