//! Replica registry.
//!
//! Holds the static replica fleet and lazily materializes one
//! [`DocumentStoreClient`] handle per replica. Handles are cached for
//! the process lifetime; replicas are never added or removed after
//! startup.
//!
//! A replica whose client cannot be constructed (e.g. malformed
//! connection string) does not abort startup: `client_for` returns the
//! error to the caller, the health prober converts it into an unhealthy
//! record, and the replica simply never wins an election until fixed.

use crate::config::ReplicaConfig;
use crate::error::{CoordinatorError, Result};
use crate::store::DocumentStoreClient;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// The static replica fleet plus its lazily-built client handles.
pub struct ReplicaRegistry {
    /// Replica descriptors, sorted by (priority, name).
    replicas: Vec<ReplicaConfig>,
    /// Cached client handles, keyed by replica name.
    clients: DashMap<String, Arc<dyn DocumentStoreClient>>,
}

impl ReplicaRegistry {
    /// Validate and register the fleet. Fails on an empty list or
    /// duplicate replica names.
    pub fn new(mut replicas: Vec<ReplicaConfig>) -> Result<Self> {
        if replicas.is_empty() {
            return Err(CoordinatorError::Config(
                "at least one replica must be configured".to_string(),
            ));
        }

        replicas.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.name.cmp(&b.name)));

        let mut names: Vec<&str> = replicas.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        for pair in names.windows(2) {
            if pair[0] == pair[1] {
                return Err(CoordinatorError::Config(format!(
                    "duplicate replica name: {}",
                    pair[0]
                )));
            }
        }

        Ok(Self {
            replicas,
            clients: DashMap::new(),
        })
    }

    /// All replicas, sorted by ascending priority.
    pub fn all(&self) -> &[ReplicaConfig] {
        &self.replicas
    }

    /// Look up a replica descriptor by name.
    pub fn get(&self, name: &str) -> Option<&ReplicaConfig> {
        self.replicas.iter().find(|r| r.name == name)
    }

    /// Number of registered replicas.
    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    /// Get the cached client handle for a replica, constructing it on
    /// first use.
    ///
    /// Construction failure is returned to the caller rather than
    /// panicking: the prober records it as unhealthy, the executor
    /// treats it as a failed attempt.
    pub fn client_for(&self, name: &str) -> Result<Arc<dyn DocumentStoreClient>> {
        if let Some(client) = self.clients.get(name) {
            return Ok(client.value().clone());
        }

        let replica = self.get(name).ok_or_else(|| {
            CoordinatorError::Config(format!("unknown replica: {}", name))
        })?;

        match replica.connection.build() {
            Ok(client) => {
                debug!(replica = %name, "Constructed store client");
                // Entry may have been raced in by a concurrent caller;
                // keep whichever landed first so callers share one handle.
                let entry = self
                    .clients
                    .entry(name.to_string())
                    .or_insert_with(|| client);
                Ok(entry.value().clone())
            }
            Err(e) => {
                warn!(replica = %name, error = %e, "Store client construction failed");
                Err(CoordinatorError::unreachable(name, e.to_string()))
            }
        }
    }

    /// Replace the cached client for a replica.
    ///
    /// Intended for tests and sync tooling that need to inject a custom
    /// backend behind a configured replica name.
    pub fn install_client(&self, name: &str, client: Arc<dyn DocumentStoreClient>) {
        self.clients.insert(name.to_string(), client);
    }
}
