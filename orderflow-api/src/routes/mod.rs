//! REST API Routes Module
//!
//! - `GET /` liveness banner
//! - `GET /order/:order_uid` cache-first order lookup
//! - `POST /topics/:topic/partitions/:partition` producer ingress, only
//!   mounted when orders flow through the in-process broker
//! - `GET /metrics` Prometheus scrape endpoint

pub mod index;
pub mod order;
pub mod publish;

use axum::{middleware::from_fn, routing::get, Router};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use index::create_router as index_router;
pub use order::create_router as order_router;
pub use publish::create_router as publish_router;

/// Build the complete router with observability layers applied.
///
/// A panicking handler answers 500 and is still counted and logged.
pub fn create_api_router(state: AppState) -> Router {
    with_layers(read_routes().merge(publish_router()), state)
}

/// Router for a service fed by an external stream: no producer ingress.
pub fn create_consumer_router(state: AppState) -> Router {
    with_layers(read_routes(), state)
}

fn read_routes() -> Router<AppState> {
    Router::new()
        .merge(index_router())
        .merge(order_router())
        .route("/metrics", get(metrics_handler))
}

fn with_layers(routes: Router<AppState>, state: AppState) -> Router {
    routes
        .layer(CatchPanicLayer::new())
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use orderflow_ingest::{BrokerConfig, MemoryBroker};
    use orderflow_storage::{InMemoryOrderRepository, MemoryOrderCache, OrderService};
    use std::sync::Arc;
    use tower::ServiceExt; // for `oneshot`

    fn app() -> Router {
        let cache = Arc::new(MemoryOrderCache::new(2).unwrap());
        let service = OrderService::new(InMemoryOrderRepository::new(), cache);
        create_api_router(AppState::new(
            Arc::new(service),
            MemoryBroker::new(BrokerConfig::default()),
        ))
    }

    async fn body_text(response: axum::response::Response) -> Result<String, String> {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string())
    }

    #[tokio::test]
    async fn test_index_banner() -> Result<(), String> {
        let request = Request::builder()
            .uri("/")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;
        let response = app()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await?, crate::constants::INDEX_BANNER);
        Ok(())
    }

    #[tokio::test]
    async fn test_metrics_lists_request_counter_by_route() -> Result<(), String> {
        let router = app();
        let request = Request::builder()
            .uri("/order/missing-order-01")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;
        let response = router
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;
        let response = router
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::OK);

        let text = body_text(response).await?;
        assert!(text.contains("orderflow_http_requests_total"));
        assert!(text.contains("path=\"/order/:order_uid\""));
        assert!(!text.contains("missing-order-01"));
        Ok(())
    }

    #[tokio::test]
    async fn test_consumer_router_has_no_publish_route() -> Result<(), String> {
        let cache = Arc::new(MemoryOrderCache::new(2).unwrap());
        let service = OrderService::new(InMemoryOrderRepository::new(), cache);
        let broker = MemoryBroker::new(BrokerConfig::default());
        broker.create_topic("orders", 1).map_err(|e| e.to_string())?;
        let router = create_consumer_router(AppState::new(Arc::new(service), broker.clone()));

        let request = Request::builder()
            .method("POST")
            .uri("/topics/orders/partitions/0")
            .body(Body::from("{}"))
            .map_err(|e| e.to_string())?;
        let response = router
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(broker.high_watermark("orders", 0).map_err(|e| e.to_string())?, 0);

        let request = Request::builder()
            .uri("/")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;
        let response = router
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() -> Result<(), String> {
        let request = Request::builder()
            .uri("/orders")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;
        let response = app()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }
}
