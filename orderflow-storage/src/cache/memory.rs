//! Mutex-guarded LRU implementation of [`OrderCache`].

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;
use orderflow_core::{ConfigError, Order, OrderflowResult};
use tracing::trace;

use super::traits::{CacheStats, OrderCache};

/// Largest capacity a cache can be built with.
pub const MAX_CACHE_CAPACITY: usize = 10_000_000;

#[derive(Debug)]
struct Inner {
    // Unbounded map, bounded by `MemoryOrderCache::put`. A bounded
    // `LruCache` reserves its whole capacity up front.
    entries: LruCache<String, Arc<Order>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// In-process order cache.
///
/// One coarse lock guards the index, the recency list and the counters
/// together. Values are shared as `Arc<Order>` so a hit never clones a record
/// while the lock is held.
#[derive(Debug)]
pub struct MemoryOrderCache {
    inner: Mutex<Inner>,
    capacity: NonZeroUsize,
}

impl MemoryOrderCache {
    /// Build a cache holding at most `capacity` orders.
    ///
    /// Zero or more than [`MAX_CACHE_CAPACITY`] is a configuration error.
    /// Memory grows with the entries actually held, not with `capacity`.
    pub fn new(capacity: usize) -> OrderflowResult<Self> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            field: "cache_capacity".to_string(),
            value: capacity.to_string(),
            reason,
        };
        if capacity > MAX_CACHE_CAPACITY {
            return Err(invalid(format!("must not exceed {}", MAX_CACHE_CAPACITY)).into());
        }
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| invalid("must be greater than zero".to_string()))?;
        Ok(Self {
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            capacity,
        })
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> Vec<String> {
        self.lock().entries.iter().rev().map(|(k, _)| k.clone()).collect()
    }

    /// Whether `order_uid` is cached, without touching recency or counters.
    pub fn contains(&self, order_uid: &str) -> bool {
        self.lock().entries.contains(order_uid)
    }

    // Every mutation leaves the index and list consistent before it can
    // panic, so a poisoned guard is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl OrderCache for MemoryOrderCache {
    fn get(&self, order_uid: &str) -> Option<Arc<Order>> {
        let mut inner = self.lock();
        match inner.entries.get(order_uid).cloned() {
            Some(order) => {
                inner.hits += 1;
                Some(order)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    fn put(&self, order: Arc<Order>) {
        let key = order.order_uid.clone();
        let mut inner = self.lock();
        // On an unbounded map `push` only returns the replaced value.
        inner.entries.push(key, order);
        if inner.entries.len() > self.capacity.get() {
            if let Some((evicted, _)) = inner.entries.pop_lru() {
                inner.evictions += 1;
                trace!(order_uid = %evicted, "Evicted least recently used order");
            }
        }
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn capacity(&self) -> usize {
        self.capacity.get()
    }

    fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entry_count: inner.entries.len() as u64,
            evictions: inner.evictions,
        }
    }
}
