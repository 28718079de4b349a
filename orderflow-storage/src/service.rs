//! Cache-consistent write and read paths.
//!
//! Writes go to the durable store first and reach the cache only after the
//! store accepted them. Reads consult the cache and fall back to the store
//! on a miss.

use std::sync::Arc;

use async_trait::async_trait;
use orderflow_core::{Order, OrderflowError, OrderflowResult, Validate};
use tracing::{debug, warn};

use crate::cache::OrderCache;
use crate::repository::OrderRepository;

/// Inbound write contract used by the ingestion handler.
#[async_trait]
pub trait AddOrder: Send + Sync {
    async fn add(&self, order: Order) -> OrderflowResult<()>;
}

/// Lookup contract used by the HTTP surface.
#[async_trait]
pub trait GetOrder: Send + Sync {
    /// Returns [`OrderflowError::NotFound`] when neither the cache nor the
    /// store has the key.
    async fn get(&self, order_uid: &str) -> OrderflowResult<OrderRead>;
}

/// What the read path does with an order found only in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    /// Return it without caching. Repeated misses repeat the store query.
    #[default]
    CacheAside,
    /// Return it and insert it into the cache.
    ReadThrough,
}

/// Where a lookup was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    Cache,
    Store,
}

impl ReadSource {
    pub fn label(&self) -> &'static str {
        match self {
            ReadSource::Cache => "hit",
            ReadSource::Store => "miss",
        }
    }
}

/// A resolved order and where it came from.
#[derive(Debug, Clone)]
pub struct OrderRead {
    pub order: Arc<Order>,
    pub source: ReadSource,
}

impl OrderRead {
    pub fn from_cache(order: Arc<Order>) -> Self {
        Self {
            order,
            source: ReadSource::Cache,
        }
    }

    pub fn from_store(order: Arc<Order>) -> Self {
        Self {
            order,
            source: ReadSource::Store,
        }
    }

    pub fn is_cache_hit(&self) -> bool {
        self.source == ReadSource::Cache
    }
}

/// Binds one durable store to one cache.
pub struct OrderService<R, C: ?Sized> {
    repository: R,
    cache: Arc<C>,
    policy: ReadPolicy,
}

impl<R, C> OrderService<R, C>
where
    R: OrderRepository,
    C: OrderCache + ?Sized,
{
    pub fn new(repository: R, cache: Arc<C>) -> Self {
        Self {
            repository,
            cache,
            policy: ReadPolicy::default(),
        }
    }

    pub fn with_read_policy(mut self, policy: ReadPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl<R, C> AddOrder for OrderService<R, C>
where
    R: OrderRepository,
    C: OrderCache + ?Sized,
{
    async fn add(&self, order: Order) -> OrderflowResult<()> {
        order.validate()?;

        if let Err(e) = self.repository.add_order(&order).await {
            warn!(order_uid = %order.order_uid, error = %e, "Order not persisted; cache untouched");
            return Err(e);
        }

        debug!(order_uid = %order.order_uid, "Order persisted");
        self.cache.put(Arc::new(order));
        Ok(())
    }
}

#[async_trait]
impl<R, C> GetOrder for OrderService<R, C>
where
    R: OrderRepository,
    C: OrderCache + ?Sized,
{
    async fn get(&self, order_uid: &str) -> OrderflowResult<OrderRead> {
        if let Some(order) = self.cache.get(order_uid) {
            debug!(order_uid, "Cache hit");
            return Ok(OrderRead::from_cache(order));
        }

        let order = self
            .repository
            .get_order(order_uid)
            .await?
            .ok_or_else(|| OrderflowError::not_found(order_uid))?;
        let order = Arc::new(order);

        if self.policy == ReadPolicy::ReadThrough {
            self.cache.put(Arc::clone(&order));
        }
        debug!(order_uid, policy = ?self.policy, "Cache miss served from store");
        Ok(OrderRead::from_store(order))
    }
}

#[async_trait]
impl<T: AddOrder + ?Sized> AddOrder for Arc<T> {
    async fn add(&self, order: Order) -> OrderflowResult<()> {
        (**self).add(order).await
    }
}

#[async_trait]
impl<T: GetOrder + ?Sized> GetOrder for Arc<T> {
    async fn get(&self, order_uid: &str) -> OrderflowResult<OrderRead> {
        (**self).get(order_uid).await
    }
}
