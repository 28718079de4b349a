//! Message handlers and handler decorators.
//!
//! Handlers compose by wrapping: a decorator owns the handler it wraps and is
//! built once, before the pipeline starts. Nothing here is swapped at runtime.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use orderflow_core::Order;
use orderflow_storage::AddOrder;
use tracing::{debug, error};

use crate::error::{IngestError, IngestResult};
use crate::message::StreamMessage;

/// Processes one delivered message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &StreamMessage) -> IngestResult<()>;
}

#[async_trait]
impl<H: MessageHandler + ?Sized> MessageHandler for Arc<H> {
    async fn handle(&self, message: &StreamMessage) -> IngestResult<()> {
        (**self).handle(message).await
    }
}

#[async_trait]
impl<H: MessageHandler + ?Sized> MessageHandler for Box<H> {
    async fn handle(&self, message: &StreamMessage) -> IngestResult<()> {
        (**self).handle(message).await
    }
}

/// Decodes a JSON order payload and hands it to the write path.
pub struct OrderHandler<S> {
    orders: S,
}

impl<S: AddOrder> OrderHandler<S> {
    pub fn new(orders: S) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl<S: AddOrder> MessageHandler for OrderHandler<S> {
    async fn handle(&self, message: &StreamMessage) -> IngestResult<()> {
        let order: Order =
            serde_json::from_slice(&message.payload).map_err(|e| IngestError::Decode {
                offset: message.offset,
                reason: e.to_string(),
            })?;
        let order_uid = order.order_uid.clone();

        self.orders.add(order).await?;

        debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            order_uid = %order_uid,
            "Order ingested"
        );
        Ok(())
    }
}

/// Turns a panic inside the wrapped handler into [`IngestError::Panicked`].
///
/// The panic is contained to the message being handled; the partition worker
/// that called this decorator keeps running.
pub struct PanicGuard<H> {
    inner: H,
}

impl<H: MessageHandler> PanicGuard<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<H: MessageHandler> MessageHandler for PanicGuard<H> {
    async fn handle(&self, message: &StreamMessage) -> IngestResult<()> {
        match AssertUnwindSafe(self.inner.handle(message))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    panic = %reason,
                    "Recovered from panic while handling message"
                );
                Err(IngestError::Panicked { message: reason })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_core::{OrderflowError, OrderflowResult, ValidationError};
    use orderflow_test_utils::{order_payload, sample_order};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingWriter {
        added: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AddOrder for RecordingWriter {
        async fn add(&self, order: Order) -> OrderflowResult<()> {
            if order.order_uid.starts_with("reject") {
                return Err(OrderflowError::from(ValidationError::RequiredFieldMissing {
                    field: "track_number".to_string(),
                }));
            }
            self.added.lock().unwrap().push(order.order_uid);
            Ok(())
        }
    }

    struct Exploding;

    #[async_trait]
    impl MessageHandler for Exploding {
        async fn handle(&self, message: &StreamMessage) -> IngestResult<()> {
            if message.offset == 1 {
                panic!("boom at offset {}", message.offset);
            }
            Ok(())
        }
    }

    fn message(offset: i64, payload: Vec<u8>) -> StreamMessage {
        StreamMessage::new("orders", 0, offset, payload)
    }

    #[tokio::test]
    async fn test_order_handler_decodes_and_adds() {
        let writer = Arc::new(RecordingWriter::default());
        let handler = OrderHandler::new(Arc::clone(&writer));

        let payload = order_payload(&sample_order("order-aaaa"));
        handler.handle(&message(0, payload)).await.unwrap();
        assert_eq!(*writer.added.lock().unwrap(), vec!["order-aaaa".to_string()]);
    }

    #[tokio::test]
    async fn test_order_handler_reports_decode_error() {
        let handler = OrderHandler::new(Arc::new(RecordingWriter::default()));
        let err = handler
            .handle(&message(3, b"{not json".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Decode { offset: 3, .. }));
    }

    #[tokio::test]
    async fn test_order_handler_surfaces_rejection() {
        let handler = OrderHandler::new(Arc::new(RecordingWriter::default()));
        let payload = order_payload(&sample_order("reject-0001"));
        let err = handler.handle(&message(0, payload)).await.unwrap_err();
        assert_eq!(err.kind(), "invalid");
    }

    #[tokio::test]
    async fn test_panic_guard_contains_panic() {
        let guard = PanicGuard::new(Exploding);
        assert!(guard.handle(&message(0, vec![])).await.is_ok());

        let err = guard.handle(&message(1, vec![])).await.unwrap_err();
        match err {
            IngestError::Panicked { message } => assert!(message.contains("boom at offset 1")),
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(guard.handle(&message(2, vec![])).await.is_ok());
    }

    #[test]
    fn test_panic_message_payloads() {
        let static_str: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(static_str.as_ref()), "static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
