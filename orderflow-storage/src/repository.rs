//! Durable store contract and an in-memory implementation.
//!
//! The PostgreSQL implementation lives in `orderflow-api`; this crate only
//! depends on the trait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use orderflow_core::{Order, OrderflowResult, StorageError};

/// Durable, transactional order storage.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist an order atomically across all of its sub-structures.
    ///
    /// Rejects an `order_uid` that is already stored.
    async fn add_order(&self, order: &Order) -> OrderflowResult<()>;

    /// The `limit` most recently created orders, newest first.
    async fn get_orders(&self, limit: usize) -> OrderflowResult<Vec<Order>>;

    /// A single order, or `None` when the store has no such key.
    async fn get_order(&self, order_uid: &str) -> OrderflowResult<Option<Order>>;
}

#[async_trait]
impl<R: OrderRepository + ?Sized> OrderRepository for Arc<R> {
    async fn add_order(&self, order: &Order) -> OrderflowResult<()> {
        (**self).add_order(order).await
    }

    async fn get_orders(&self, limit: usize) -> OrderflowResult<Vec<Order>> {
        (**self).get_orders(limit).await
    }

    async fn get_order(&self, order_uid: &str) -> OrderflowResult<Option<Order>> {
        (**self).get_order(order_uid).await
    }
}

/// Call counts recorded by [`InMemoryOrderRepository`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryCalls {
    pub add_order: u64,
    pub get_orders: u64,
    pub get_order: u64,
}

/// In-memory store for tests and local runs.
///
/// Writes and reads can be made to fail on demand to exercise error paths.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, (u64, Order)>>,
    next_seq: AtomicU64,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    add_calls: AtomicU64,
    list_calls: AtomicU64,
    get_calls: AtomicU64,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `orders`, bypassing validation and counters.
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let repo = Self::new();
        if let Ok(mut map) = repo.orders.write() {
            for order in orders {
                let seq = repo.next_seq.fetch_add(1, Ordering::Relaxed);
                map.insert(order.order_uid.clone(), (seq, order));
            }
        }
        repo
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> RepositoryCalls {
        RepositoryCalls {
            add_order: self.add_calls.load(Ordering::Relaxed),
            get_orders: self.list_calls.load(Ordering::Relaxed),
            get_order: self.get_calls.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.orders.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, order_uid: &str) -> bool {
        self.orders
            .read()
            .map(|m| m.contains_key(order_uid))
            .unwrap_or(false)
    }

    fn check_reads(&self) -> Result<(), StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "injected read failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn add_order(&self, order: &Order) -> OrderflowResult<()> {
        self.add_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::TransactionFailed {
                reason: "injected write failure".to_string(),
            }
            .into());
        }

        let mut orders = self.orders.write().map_err(|_| StorageError::LockPoisoned)?;
        if orders.contains_key(&order.order_uid) {
            return Err(StorageError::InsertFailed {
                order_uid: order.order_uid.clone(),
                reason: "duplicate order_uid".to_string(),
            }
            .into());
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        orders.insert(order.order_uid.clone(), (seq, order.clone()));
        Ok(())
    }

    async fn get_orders(&self, limit: usize) -> OrderflowResult<Vec<Order>> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        self.check_reads()?;

        let orders = self.orders.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut all: Vec<&(u64, Order)> = orders.values().collect();
        // Newest first; insertion sequence breaks timestamp ties.
        all.sort_by(|a, b| {
            b.1.date_created
                .cmp(&a.1.date_created)
                .then_with(|| b.0.cmp(&a.0))
        });
        Ok(all
            .into_iter()
            .take(limit)
            .map(|(_, order)| order.clone())
            .collect())
    }

    async fn get_order(&self, order_uid: &str) -> OrderflowResult<Option<Order>> {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        self.check_reads()?;

        let orders = self.orders.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(orders.get(order_uid).map(|(_, order)| order.clone()))
    }
}
