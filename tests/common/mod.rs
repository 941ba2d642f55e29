//! Shared test utilities.
//!
//! Provides:
//! - A recording [`MockStore`] with fault injection
//! - Helpers to build a started coordinator over mock replicas

pub mod containers;
pub mod mock_store;

pub use mock_store::*;

use replica_coordinator::{CoordinatorConfig, ReplicaCoordinator};
use std::collections::HashMap;
use std::sync::Arc;

/// Build a coordinator over the standard three-replica test fleet, with
/// one [`MockStore`] installed per replica, and start it.
///
/// Returns the coordinator plus the mocks keyed by replica name.
#[allow(dead_code)] // Not every test binary uses every helper
pub async fn started_mock_coordinator(
) -> (Arc<ReplicaCoordinator>, HashMap<String, Arc<MockStore>>) {
    let coordinator =
        Arc::new(ReplicaCoordinator::new(CoordinatorConfig::for_testing()).unwrap());

    let mut mocks = HashMap::new();
    for name in ["primary", "secondary", "tertiary"] {
        let mock = Arc::new(MockStore::new());
        coordinator.registry().install_client(name, mock.clone());
        mocks.insert(name.to_string(), mock);
    }

    coordinator.start().await.unwrap();
    (coordinator, mocks)
}
