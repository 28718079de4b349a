//! orderflow API - HTTP surface and process wiring
//!
//! Connects the pieces of the service: environment configuration, the
//! PostgreSQL order store, the bounded cache and its preloader, the
//! ingestion pipeline over the in-process broker, and the Axum router.

#[macro_use]
mod macros;

pub mod app;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod validation;

// Re-export commonly used types
pub use app::{shutdown_signal, App, RunSummary};
pub use config::{AppConfig, CacheSettings, HttpSettings, IngestSettings};
pub use db::{DbConfig, PgOrderRepository};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::{create_api_router, create_consumer_router};
pub use state::AppState;
