//! Primary election.
//!
//! The primary is the healthy replica with the lowest priority value.
//! Selection is **sticky**: once elected, a primary keeps the role while
//! its health record stays healthy, even if a lower-priority replica
//! recovers. The scan re-runs only when:
//!
//! - there is no elected primary yet (startup),
//! - the incumbent's health record has gone unhealthy (lazy failover,
//!   observed by the executor on its next call), or
//! - an operator calls [`force_failover()`](PrimarySelector::force_failover).
//!
//! The health monitor never pushes a primary change; it only updates the
//! records this module reads. Stickiness is what keeps the primary from
//! flapping on transient probe jitter.

use crate::config::ReplicaConfig;
use crate::error::{CoordinatorError, Result};
use crate::health::{is_healthy_in, HealthTable};
use crate::metrics;
use crate::registry::ReplicaRegistry;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

/// Pure election scan: the healthy replica with the lowest priority.
///
/// Ties on priority break by name, so the result is deterministic and
/// insensitive to declaration order. Returns `None` when no replica is
/// healthy (`Unknown` counts as not healthy).
pub fn select_primary<'a>(
    replicas: &'a [ReplicaConfig],
    table: &HealthTable,
) -> Option<&'a ReplicaConfig> {
    replicas
        .iter()
        .filter(|r| is_healthy_in(table, &r.name))
        .min_by(|a, b| a.priority.cmp(&b.priority).then(a.name.cmp(&b.name)))
}

/// Sticky primary state cell.
///
/// The only writers are this struct's own methods; readers get either
/// the previous primary name or the new one, never an intermediate.
pub struct PrimarySelector {
    registry: Arc<ReplicaRegistry>,
    health: watch::Receiver<HealthTable>,
    current: RwLock<Option<String>>,
}

impl PrimarySelector {
    /// Create the selector, seeding the primary with the
    /// lowest-priority-number replica (it holds the role on paper until
    /// the first probe pass says otherwise).
    pub fn new(registry: Arc<ReplicaRegistry>, health: watch::Receiver<HealthTable>) -> Self {
        let seed = registry.all().first().map(|r| r.name.clone());
        Self {
            registry,
            health,
            current: RwLock::new(seed),
        }
    }

    /// The last elected primary, without re-evaluation.
    pub async fn current(&self) -> Option<String> {
        self.current.read().await.clone()
    }

    /// Return the sticky primary if it is still healthy, otherwise
    /// re-run the election scan.
    ///
    /// Fails with [`NoHealthyReplica`](CoordinatorError::NoHealthyReplica)
    /// when the scan finds nothing; the previous primary name is kept in
    /// that case so dashboards still show who held the role last.
    pub async fn current_or_elect(&self) -> Result<String> {
        let table = self.health.borrow().clone();

        {
            let current = self.current.read().await;
            if let Some(name) = current.as_deref() {
                if is_healthy_in(&table, name) {
                    return Ok(name.to_string());
                }
            }
        }

        let mut current = self.current.write().await;
        // Re-check: another caller may have elected while we waited.
        if let Some(name) = current.as_deref() {
            if is_healthy_in(&table, name) {
                return Ok(name.to_string());
            }
        }

        match select_primary(self.registry.all(), &table) {
            Some(winner) => {
                if current.as_deref() != Some(winner.name.as_str()) {
                    info!(
                        previous = current.as_deref().unwrap_or("none"),
                        primary = %winner.name,
                        priority = winner.priority,
                        "Elected new primary"
                    );
                    metrics::record_primary_elected(&winner.name);
                }
                *current = Some(winner.name.clone());
                Ok(winner.name.clone())
            }
            None => {
                warn!("Election found no healthy replica");
                Err(CoordinatorError::NoHealthyReplica)
            }
        }
    }

    /// Re-run the scan, skipping the incumbent even if it is healthy.
    ///
    /// Explicit operator action. Picks the lowest-priority healthy
    /// replica among the others; fails with `NoHealthyReplica` (leaving
    /// the incumbent in place) if none remain.
    pub async fn force_failover(&self) -> Result<String> {
        let table = self.health.borrow().clone();
        let mut current = self.current.write().await;
        let incumbent = current.clone();

        let winner = self
            .registry
            .all()
            .iter()
            .filter(|r| Some(r.name.as_str()) != incumbent.as_deref())
            .filter(|r| is_healthy_in(&table, &r.name))
            .min_by(|a, b| a.priority.cmp(&b.priority).then(a.name.cmp(&b.name)));

        match winner {
            Some(winner) => {
                info!(
                    previous = incumbent.as_deref().unwrap_or("none"),
                    primary = %winner.name,
                    "Forced failover"
                );
                metrics::record_forced_failover(incumbent.as_deref(), &winner.name);
                *current = Some(winner.name.clone());
                Ok(winner.name.clone())
            }
            None => {
                warn!(
                    incumbent = incumbent.as_deref().unwrap_or("none"),
                    "Forced failover found no other healthy replica"
                );
                Err(CoordinatorError::NoHealthyReplica)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CoordinatorConfig, ReplicaConfig};
    use crate::health::{HealthMonitor, HealthRecord};
    use crate::store::MemoryStore;

    struct Fixture {
        #[allow(dead_code)] // Keeps the registry (and its clients) alive
        registry: Arc<ReplicaRegistry>,
        monitor: Arc<HealthMonitor>,
        selector: PrimarySelector,
        stores: Vec<(String, Arc<MemoryStore>)>,
    }

    /// Three memory replicas with injected stores so tests can knock
    /// individual replicas offline.
    async fn fixture() -> Fixture {
        let config = CoordinatorConfig::for_testing();
        let registry = Arc::new(ReplicaRegistry::new(config.replicas).unwrap());

        let mut stores = Vec::new();
        for name in ["primary", "secondary", "tertiary"] {
            let store = Arc::new(MemoryStore::new());
            registry.install_client(name, store.clone());
            stores.push((name.to_string(), store));
        }

        let monitor = HealthMonitor::new(Arc::clone(&registry), &config.settings);
        let selector = PrimarySelector::new(Arc::clone(&registry), monitor.subscribe());
        Fixture {
            registry,
            monitor,
            selector,
            stores,
        }
    }

    fn store(fixture: &Fixture, name: &str) -> Arc<MemoryStore> {
        fixture
            .stores
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s.clone())
            .unwrap()
    }

    #[tokio::test]
    async fn test_seeded_with_lowest_priority() {
        let f = fixture().await;
        assert_eq!(f.selector.current().await.as_deref(), Some("primary"));
    }

    #[tokio::test]
    async fn test_elects_lowest_priority_healthy() {
        let f = fixture().await;
        f.monitor.run_probe_pass().await;
        assert_eq!(f.selector.current_or_elect().await.unwrap(), "primary");
    }

    #[tokio::test]
    async fn test_unknown_replicas_are_not_electable() {
        let f = fixture().await;
        // No probe pass has run: every record is Unknown.
        let result = f.selector.current_or_elect().await;
        assert!(matches!(result, Err(CoordinatorError::NoHealthyReplica)));
    }

    #[tokio::test]
    async fn test_election_skips_unhealthy() {
        let f = fixture().await;
        store(&f, "primary").set_offline(true);
        f.monitor.run_probe_pass().await;

        assert_eq!(f.selector.current_or_elect().await.unwrap(), "secondary");
    }

    #[tokio::test]
    async fn test_sticky_while_incumbent_healthy() {
        let f = fixture().await;

        // Elect secondary while primary is down...
        store(&f, "primary").set_offline(true);
        f.monitor.run_probe_pass().await;
        assert_eq!(f.selector.current_or_elect().await.unwrap(), "secondary");

        // ...then primary recovers: the role does NOT move back.
        store(&f, "primary").set_offline(false);
        f.monitor.run_probe_pass().await;
        assert_eq!(f.selector.current_or_elect().await.unwrap(), "secondary");
    }

    #[tokio::test]
    async fn test_reelects_when_incumbent_goes_unhealthy() {
        let f = fixture().await;
        f.monitor.run_probe_pass().await;
        assert_eq!(f.selector.current_or_elect().await.unwrap(), "primary");

        store(&f, "primary").set_offline(true);
        f.monitor.run_probe_pass().await;
        assert_eq!(f.selector.current_or_elect().await.unwrap(), "secondary");
    }

    #[tokio::test]
    async fn test_all_unhealthy_keeps_last_primary_name() {
        let f = fixture().await;
        f.monitor.run_probe_pass().await;
        f.selector.current_or_elect().await.unwrap();

        for (_, s) in &f.stores {
            s.set_offline(true);
        }
        f.monitor.run_probe_pass().await;

        let result = f.selector.current_or_elect().await;
        assert!(matches!(result, Err(CoordinatorError::NoHealthyReplica)));
        // Last holder still visible for dashboards.
        assert_eq!(f.selector.current().await.as_deref(), Some("primary"));
    }

    #[tokio::test]
    async fn test_force_failover_skips_healthy_incumbent() {
        let f = fixture().await;
        f.monitor.run_probe_pass().await;
        assert_eq!(f.selector.current_or_elect().await.unwrap(), "primary");

        let new_primary = f.selector.force_failover().await.unwrap();
        assert_eq!(new_primary, "secondary");
        assert_eq!(f.selector.current().await.as_deref(), Some("secondary"));
    }

    #[tokio::test]
    async fn test_force_failover_twice_returns_to_lowest() {
        let f = fixture().await;
        f.monitor.run_probe_pass().await;
        f.selector.current_or_elect().await.unwrap();

        assert_eq!(f.selector.force_failover().await.unwrap(), "secondary");
        // From secondary, the lowest-priority healthy non-incumbent is
        // the original primary again.
        assert_eq!(f.selector.force_failover().await.unwrap(), "primary");
    }

    #[tokio::test]
    async fn test_force_failover_no_alternative_fails() {
        let config = CoordinatorConfig {
            replicas: vec![ReplicaConfig::memory("only", 1)],
            ..CoordinatorConfig::for_testing()
        };
        let registry = Arc::new(ReplicaRegistry::new(config.replicas).unwrap());
        let monitor = HealthMonitor::new(Arc::clone(&registry), &config.settings);
        let selector = PrimarySelector::new(Arc::clone(&registry), monitor.subscribe());

        monitor.run_probe_pass().await;
        assert_eq!(selector.current_or_elect().await.unwrap(), "only");

        let result = selector.force_failover().await;
        assert!(matches!(result, Err(CoordinatorError::NoHealthyReplica)));
        // Incumbent keeps the role after a failed failover.
        assert_eq!(selector.current().await.as_deref(), Some("only"));
    }

    #[test]
    fn test_select_primary_pure() {
        let replicas = vec![
            ReplicaConfig::memory("c", 3),
            ReplicaConfig::memory("a", 1),
            ReplicaConfig::memory("b", 2),
        ];

        let mut map = std::collections::HashMap::new();
        map.insert("a".to_string(), HealthRecord::unhealthy("a", "down"));
        map.insert("b".to_string(), HealthRecord::healthy("b", 5));
        map.insert("c".to_string(), HealthRecord::healthy("c", 5));
        let table: HealthTable = Arc::new(map);

        let winner = select_primary(&replicas, &table).unwrap();
        assert_eq!(winner.name, "b");
    }

    #[test]
    fn test_select_primary_none_healthy() {
        let replicas = vec![ReplicaConfig::memory("a", 1)];
        let mut map = std::collections::HashMap::new();
        map.insert("a".to_string(), HealthRecord::unknown("a"));
        let table: HealthTable = Arc::new(map);

        assert!(select_primary(&replicas, &table).is_none());
    }
}
