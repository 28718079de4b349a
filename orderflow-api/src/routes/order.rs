//! Order lookup route.
//!
//! `GET /order/:order_uid` runs the read path: cache first, durable store on
//! a miss. The `x-cache` response header reports which one answered.

use axum::{
    extract::{Path, State},
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use orderflow_core::Order;

use crate::error::ApiResult;
use crate::state::{AppState, SharedOrders};
use crate::telemetry::METRICS;
use crate::validation::ValidateOrderUid;

pub const CACHE_HEADER: &str = "x-cache";

pub async fn get_order(
    State(orders): State<SharedOrders>,
    Path(order_uid): Path<String>,
) -> ApiResult<Response> {
    order_uid.validate_order_uid()?;

    let read = orders.get(&order_uid).await?;
    let label = read.source.label();
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_cache_lookup(label);
    }
    tracing::debug!(order_uid = %order_uid, cache = label, "Order served");

    let order: Order = read.order.as_ref().clone();
    let mut response = Json(order).into_response();
    response
        .headers_mut()
        .insert(CACHE_HEADER, HeaderValue::from_static(label));
    Ok(response)
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/order/:order_uid", get(get_order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use orderflow_ingest::{BrokerConfig, MemoryBroker};
    use orderflow_storage::{
        InMemoryOrderRepository, MemoryOrderCache, OrderCache, OrderRepository, OrderService,
    };
    use orderflow_test_utils::sample_order;
    use std::sync::Arc;
    use tower::ServiceExt; // for `oneshot`

    struct Fixture {
        repo: Arc<InMemoryOrderRepository>,
        cache: Arc<MemoryOrderCache>,
        router: Router,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let cache = Arc::new(MemoryOrderCache::new(4).unwrap());
        let service = OrderService::new(Arc::clone(&repo), Arc::clone(&cache));
        let state = AppState::new(
            Arc::new(service),
            MemoryBroker::new(BrokerConfig::default()),
        );
        Fixture {
            repo,
            cache,
            router: create_router().with_state(state),
        }
    }

    async fn get(router: Router, uri: &str) -> Result<Response, String> {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .map_err(|e| e.to_string())?;
        router
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))
    }

    async fn body_json(response: Response) -> Result<serde_json::Value, String> {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        serde_json::from_slice(&bytes).map_err(|e| e.to_string())
    }

    #[tokio::test]
    async fn test_cached_order_is_served_from_cache() -> Result<(), String> {
        let f = fixture();
        f.cache.put(Arc::new(sample_order("b563feb7b2b84b6test")));

        let response = get(f.router, "/order/b563feb7b2b84b6test").await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CACHE_HEADER], "hit");
        let json = body_json(response).await?;
        assert_eq!(json["order_uid"], "b563feb7b2b84b6test");
        assert_eq!(f.repo.calls().get_order, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_miss_falls_back_to_store() -> Result<(), String> {
        let f = fixture();
        f.repo
            .add_order(&sample_order("stored-only-0001"))
            .await
            .map_err(|e| e.to_string())?;

        let response = get(f.router, "/order/stored-only-0001").await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CACHE_HEADER], "miss");
        let json = body_json(response).await?;
        assert_eq!(json["delivery"]["city"], "Kiryat Mozkin");
        assert_eq!(f.repo.calls().get_order, 1);
        // Cache-aside: a store read does not populate the cache.
        assert!(f.cache.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_order_is_404() -> Result<(), String> {
        let f = fixture();
        let response = get(f.router, "/order/missing-order-01").await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await?;
        assert_eq!(json["code"], "ORDER_NOT_FOUND");
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_uid_is_400_without_lookup() -> Result<(), String> {
        let f = fixture();
        let response = get(f.router, "/order/bad!uid").await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(f.repo.calls().get_order, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_store_failure_is_generic_500() -> Result<(), String> {
        let f = fixture();
        f.repo.fail_reads(true);
        let response = get(f.router, "/order/stored-only-0001").await?;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await?;
        assert_eq!(json["message"], "Internal server error");
        Ok(())
    }
}
