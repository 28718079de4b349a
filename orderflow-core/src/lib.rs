//! orderflow Core - Order Record Types
//!
//! Pure data structures shared by every other crate in the workspace:
//! the order record and its sub-structures, the structural validation
//! contract applied before persistence, and the error taxonomy.
//!
//! This crate performs no I/O.

pub mod error;
pub mod order;
pub mod validation;

pub use error::{ConfigError, OrderflowError, OrderflowResult, StorageError, ValidationError};
pub use order::{Delivery, Item, Order, OrderUid, Payment, Timestamp};
pub use validation::Validate;
