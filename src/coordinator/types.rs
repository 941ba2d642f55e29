//! Coordinator state types.
//!
//! Defines the lifecycle state machine for the coordinator.
//!
//! # State Transitions
//!
//! ```text
//!            start()              shutdown()
//! Created ────────────→ Running ────────────→ ShuttingDown
//!    │                                              │
//!    │ shutdown() (never started)                   │
//!    ↓                                              ↓
//! Stopped ←─────────────────────────────────────────┘
//! ```
//!
//! # State Descriptions
//!
//! - **Created**: constructed, health monitor not running yet.
//! - **Running**: probes on a timer, queries and fan-out being served.
//! - **ShuttingDown**: `shutdown()` called, waiting for the probe loop.
//! - **Stopped**: clean shutdown complete. Safe to drop.

use crate::health::{HealthRecord, ReplicaStatus};
use serde::Serialize;

/// Lifecycle state of the coordinator.
///
/// See module docs for the transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Constructed but not started. Call
    /// [`start()`](super::ReplicaCoordinator::start) to begin probing.
    Created,
    /// Serving queries; health monitor running.
    Running,
    /// `shutdown()` called; stopping the probe loop.
    ShuttingDown,
    /// Shut down cleanly. Safe to drop.
    Stopped,
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinatorState::Created => write!(f, "Created"),
            CoordinatorState::Running => write!(f, "Running"),
            CoordinatorState::ShuttingDown => write!(f, "ShuttingDown"),
            CoordinatorState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Aggregate health summary for ops endpoints.
///
/// Collected from cached internal state — building one performs no
/// network I/O.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorHealth {
    /// Lifecycle state name (`"Running"`, ...).
    pub state: String,
    /// Running with at least one healthy replica.
    pub ready: bool,
    /// Last elected primary, if any election has succeeded.
    pub current_primary: Option<String>,
    pub replicas_healthy: usize,
    pub replicas_total: usize,
    /// The full health table, one record per replica.
    pub replicas: Vec<HealthRecord>,
}

impl CoordinatorHealth {
    /// Count records in a given status.
    pub fn count_in(&self, status: ReplicaStatus) -> usize {
        self.replicas.iter().filter(|r| r.status == status).count()
    }
}
