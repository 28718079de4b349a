//! orderflow Server Entry Point
//!
//! Loads configuration, connects to PostgreSQL and runs the service until
//! SIGINT or SIGTERM.

use orderflow_api::telemetry::{init_tracing, TelemetryConfig};
use orderflow_api::{shutdown_signal, ApiResult, App, AppConfig};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        e
    })?;

    let app = App::connect(config).await?;
    let summary = app.run(shutdown_signal()).await?;

    tracing::info!(
        preloaded = summary.preloaded,
        processed = summary.pipeline.processed,
        failed = summary.pipeline.failed,
        "Shutdown complete"
    );
    Ok(())
}
