//! Boot-time cache warm-up.

use std::sync::Arc;
use std::time::{Duration, Instant};

use orderflow_core::OrderflowResult;
use tracing::{error, info};

use super::traits::OrderCache;
use crate::repository::OrderRepository;

/// Outcome of a completed preload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadReport {
    /// Orders returned by the store and inserted.
    pub loaded: usize,
    /// The bound requested from the store.
    pub capacity: usize,
    pub elapsed: Duration,
}

/// Fills a cache with the most recently created orders from the store.
///
/// The request size is always the cache's own capacity, so the load can never
/// overflow the cache.
pub struct CachePreloader<R, C: ?Sized> {
    repository: R,
    cache: Arc<C>,
}

impl<R, C> CachePreloader<R, C>
where
    R: OrderRepository,
    C: OrderCache + ?Sized,
{
    pub fn new(repository: R, cache: Arc<C>) -> Self {
        Self { repository, cache }
    }

    /// Run the warm-up once.
    ///
    /// The store returns newest first. Orders are inserted in reverse so the
    /// newest one ends up most recently used. Store errors are returned as-is;
    /// callers treat them as fatal.
    pub async fn preload(&self) -> OrderflowResult<PreloadReport> {
        let started = Instant::now();
        let capacity = self.cache.capacity();

        let orders = match self.repository.get_orders(capacity).await {
            Ok(orders) => orders,
            Err(e) => {
                error!(error = %e, capacity, "Cache preload query failed");
                return Err(e);
            }
        };

        let loaded = orders.len();
        for order in orders.into_iter().rev() {
            self.cache.put(Arc::new(order));
        }

        let report = PreloadReport {
            loaded,
            capacity,
            elapsed: started.elapsed(),
        };
        info!(
            loaded = report.loaded,
            capacity = report.capacity,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Cache preloaded"
        );
        Ok(report)
    }
}
