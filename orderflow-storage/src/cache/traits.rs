//! Cache contract shared by the write path, read path and preloader.

use std::sync::Arc;

use orderflow_core::Order;

/// Bounded, process-local order cache.
///
/// Implementations must be safe to call from every partition worker and
/// every request handler at once. Operations are O(1) and never block on I/O,
/// so the trait is synchronous.
pub trait OrderCache: Send + Sync {
    /// Look up an order, promoting it to most recently used on a hit.
    fn get(&self, order_uid: &str) -> Option<Arc<Order>>;

    /// Insert or replace an order, promoting it to most recently used.
    ///
    /// May evict the least recently used entry.
    fn put(&self, order: Arc<Order>);

    /// Number of entries currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fixed upper bound on [`OrderCache::len`].
    fn capacity(&self) -> usize;

    /// Get cache statistics.
    fn stats(&self) -> CacheStats;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
