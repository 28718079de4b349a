//! orderflow Storage - bounded order cache and durable store contract
//!
//! Holds the pieces that keep the in-process cache consistent with the
//! durable store: the LRU cache, the boot-time preloader, the
//! [`OrderRepository`] trait and the add/get service built on top of them.
//! The PostgreSQL repository lives in `orderflow-api`.

pub mod cache;
pub mod repository;
pub mod service;

pub use cache::{
    CachePreloader, CacheStats, MemoryOrderCache, OrderCache, PreloadReport, MAX_CACHE_CAPACITY,
};
pub use repository::{InMemoryOrderRepository, OrderRepository, RepositoryCalls};
pub use service::{AddOrder, GetOrder, OrderRead, OrderService, ReadPolicy, ReadSource};
