use std::sync::Arc;

use trail_store::InMemoryEntityStore;
use trail_store::QueryOrder;

use super::DeploymentTracker;

pub(super) const PARTITION: &str = "deployments";

pub(super) fn memory_tracker() -> (DeploymentTracker, Arc<InMemoryEntityStore>) {
    memory_tracker_with_order(QueryOrder::Insertion)
}

pub(super) fn memory_tracker_with_order(
    order: QueryOrder,
) -> (DeploymentTracker, Arc<InMemoryEntityStore>) {
    let store = Arc::new(InMemoryEntityStore::with_query_order(order));
    let tracker = DeploymentTracker::new(store.clone(), PARTITION);
    (tracker, store)
}
