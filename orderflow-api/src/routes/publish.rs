//! Producer ingress.
//!
//! `POST /topics/:topic/partitions/:partition` appends the raw request body
//! to one partition of the in-process broker. The body is not inspected here;
//! decoding and validation happen in the pipeline like for any other message.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use orderflow_ingest::MemoryBroker;
use serde::{Deserialize, Serialize};

use crate::constants::MAX_PUBLISH_BYTES;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Where a published payload landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

pub async fn publish(
    State(broker): State<MemoryBroker>,
    Path((topic, partition)): Path<(String, i32)>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<PublishReceipt>)> {
    if body.is_empty() {
        return Err(ApiError::invalid_input("Message payload is empty"));
    }

    let offset = broker.produce(&topic, partition, body.to_vec())?;
    tracing::debug!(topic = %topic, partition, offset, "Payload published");

    Ok((
        StatusCode::ACCEPTED,
        Json(PublishReceipt {
            topic,
            partition,
            offset,
        }),
    ))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/topics/:topic/partitions/:partition", post(publish))
        .layer(DefaultBodyLimit::max(MAX_PUBLISH_BYTES))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use orderflow_ingest::BrokerConfig;
    use orderflow_storage::{InMemoryOrderRepository, MemoryOrderCache, OrderService};
    use std::sync::Arc;
    use tower::ServiceExt; // for `oneshot`

    fn router(broker: &MemoryBroker) -> Router {
        let cache = Arc::new(MemoryOrderCache::new(2).unwrap());
        let service = OrderService::new(InMemoryOrderRepository::new(), cache);
        create_router().with_state(AppState::new(Arc::new(service), broker.clone()))
    }

    fn broker() -> MemoryBroker {
        let broker = MemoryBroker::new(BrokerConfig::default());
        broker.create_topic("orders", 2).unwrap();
        broker
    }

    async fn post(router: Router, uri: &str, body: Vec<u8>) -> Result<axum::response::Response, String> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body))
            .map_err(|e| e.to_string())?;
        router
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))
    }

    #[tokio::test]
    async fn test_publish_appends_and_returns_offset() -> Result<(), String> {
        let broker = broker();
        let router = router(&broker);

        let response = post(router.clone(), "/topics/orders/partitions/1", b"{}".to_vec()).await?;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let response = post(router, "/topics/orders/partitions/1", b"{}".to_vec()).await?;
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        let receipt: PublishReceipt = serde_json::from_slice(&bytes).map_err(|e| e.to_string())?;

        assert_eq!(
            receipt,
            PublishReceipt {
                topic: "orders".to_string(),
                partition: 1,
                offset: 1,
            }
        );
        assert_eq!(broker.high_watermark("orders", 1).map_err(|e| e.to_string())?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_topic_or_partition_is_404() -> Result<(), String> {
        let broker = broker();
        let response = post(router(&broker), "/topics/payments/partitions/0", b"{}".to_vec()).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = post(router(&broker), "/topics/orders/partitions/7", b"{}".to_vec()).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_and_oversized_payloads_rejected() -> Result<(), String> {
        let broker = broker();
        let response = post(router(&broker), "/topics/orders/partitions/0", Vec::new()).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let huge = vec![b'x'; MAX_PUBLISH_BYTES + 1];
        let response = post(router(&broker), "/topics/orders/partitions/0", huge).await?;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(broker.high_watermark("orders", 0).map_err(|e| e.to_string())?, 0);
        Ok(())
    }
}
