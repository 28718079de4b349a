//! Shared application state for Axum routers.

use std::sync::Arc;

use orderflow_ingest::MemoryBroker;
use orderflow_storage::GetOrder;

/// The read path as seen by route handlers.
pub type SharedOrders = Arc<dyn GetOrder>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Cache-first order lookups.
    pub orders: SharedOrders,
    /// Broker fed by the publish route and consumed by the pipeline.
    pub broker: MemoryBroker,
}

impl AppState {
    pub fn new(orders: SharedOrders, broker: MemoryBroker) -> Self {
        Self { orders, broker }
    }
}

crate::impl_from_ref!(SharedOrders, orders);
crate::impl_from_ref!(MemoryBroker, broker);
