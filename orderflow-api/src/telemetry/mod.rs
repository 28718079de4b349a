//! orderflow Telemetry - Observability Infrastructure
//!
//! Structured logging through `tracing` and Prometheus metrics for the HTTP
//! surface, the read path and the ingestion pipeline.

pub mod ingest;
pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use ingest::ObservedHandler;
pub use metrics::{metrics_handler, OrderflowMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracing, LogFormat, TelemetryConfig, DEFAULT_LOG_FILTER};
