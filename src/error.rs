// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the replica coordinator.
//!
//! Errors are categorized by where they occur (one replica, the election
//! scan, the retry loop) and by whether they escalate to the caller.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Surfaced to caller |
//! |------------------|-----------|--------------------|
//! | `ReplicaUnreachable` | Yes | No — absorbed into health state |
//! | `OperationTimeout` | Yes | No — absorbed into health state |
//! | `NoHealthyReplica` | No | Yes — nothing to serve the request |
//! | `QueryFailed` | No | Yes — retries already exhausted |
//! | `Config` | No | Yes — fix the configuration and restart |
//! | `InvalidState` | No | Yes — indicates a bug in the caller |
//!
//! # Propagation Policy
//!
//! Failures local to a single replica (`ReplicaUnreachable`,
//! `OperationTimeout`) are converted into health-record updates and fed
//! back into the retry loop; they only reach the caller wrapped inside
//! `QueryFailed` once every retry against the primary has been spent.
//! Fan-out branch failures never escalate at all — the primary write has
//! already committed, so they are logged and recorded in the
//! [`FanoutReport`](crate::replicator::FanoutReport) only.

use thiserror::Error;

/// Result type alias for coordinator operations.
pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// Errors that can occur while coordinating replica access.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// Invalid replica configuration.
    ///
    /// Raised at startup for duplicate replica names or an empty replica
    /// list. Not retryable — fix the configuration and restart.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single operation against a single replica failed.
    ///
    /// Network errors, auth failures, malformed responses. Retryable:
    /// the query executor retries against the same primary, and the
    /// health monitor records the failure on the next probe.
    #[error("Replica unreachable ({replica}): {message}")]
    ReplicaUnreachable { replica: String, message: String },

    /// An operation exceeded its time budget.
    ///
    /// Treated identically to [`ReplicaUnreachable`](Self::ReplicaUnreachable)
    /// for retry and health purposes. The underlying call may still
    /// complete in the background; its result is discarded.
    #[error("Operation timed out on {replica} after {timeout_ms}ms")]
    OperationTimeout { replica: String, timeout_ms: u64 },

    /// The election scan found zero healthy replicas.
    ///
    /// Fatal for the current request. Not retryable — there is nothing
    /// to retry against until a probe brings a replica back.
    #[error("No healthy replica available")]
    NoHealthyReplica,

    /// The query executor exhausted its retries against the primary.
    ///
    /// Wraps the last underlying error. Not retryable by the caller:
    /// the executor already retried, and the primary has been marked
    /// unhealthy so the next call re-elects.
    #[error("Query failed on {replica} after {attempts} attempts: {source}")]
    QueryFailed {
        replica: String,
        attempts: u32,
        #[source]
        source: Box<CoordinatorError>,
    },

    /// Coordinator lifecycle violation.
    ///
    /// E.g. calling `start()` on an already-running coordinator.
    /// Not retryable — indicates a bug in the caller.
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },
}

impl CoordinatorError {
    /// Shorthand for a replica-local failure.
    pub fn unreachable(replica: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReplicaUnreachable {
            replica: replica.into(),
            message: message.into(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ReplicaUnreachable { .. } => true,
            Self::OperationTimeout { .. } => true,
            Self::NoHealthyReplica => false,
            Self::QueryFailed { .. } => false,
            Self::Config(_) => false,
            Self::InvalidState { .. } => false,
        }
    }
}
