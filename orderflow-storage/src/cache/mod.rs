//! Bounded in-process order cache.
//!
//! The cache is an accelerator over the durable store, never a source of
//! truth: every entry it holds was either loaded from the store or written
//! to it first.
//!
//! - [`MemoryOrderCache`] keeps an `lru::LruCache` behind one lock and
//!   implements [`OrderCache`].
//! - [`CachePreloader`] warms the cache once at startup.

pub mod memory;
pub mod preload;
pub mod traits;

pub use memory::{MemoryOrderCache, MAX_CACHE_CAPACITY};
pub use preload::{CachePreloader, PreloadReport};
pub use traits::{CacheStats, OrderCache};
