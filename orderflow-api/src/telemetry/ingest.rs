//! Prometheus accounting for stream message handling.

use async_trait::async_trait;
use orderflow_ingest::{IngestResult, MessageHandler, StreamMessage};

use super::metrics::METRICS;

/// Counts every handled message in `orderflow_ingest_messages_total` by
/// outcome: `processed` or the error's [`kind`](orderflow_ingest::IngestError::kind).
pub struct ObservedHandler<H> {
    inner: H,
}

impl<H: MessageHandler> ObservedHandler<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<H: MessageHandler> MessageHandler for ObservedHandler<H> {
    async fn handle(&self, message: &StreamMessage) -> IngestResult<()> {
        let result = self.inner.handle(message).await;
        let outcome = match &result {
            Ok(()) => "processed",
            Err(e) => e.kind(),
        };
        if let Ok(metrics) = METRICS.as_ref() {
            metrics.record_ingest(outcome);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_ingest::IngestError;

    struct Fixed(bool);

    #[async_trait]
    impl MessageHandler for Fixed {
        async fn handle(&self, message: &StreamMessage) -> IngestResult<()> {
            if self.0 {
                Ok(())
            } else {
                Err(IngestError::Decode {
                    offset: message.offset,
                    reason: "truncated".to_string(),
                })
            }
        }
    }

    fn count(outcome: &str) -> f64 {
        METRICS
            .as_ref()
            .map(|m| m.ingest_messages_total.with_label_values(&[outcome]).get())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_outcomes_are_counted_and_results_passed_through() {
        let message = StreamMessage::new("orders", 0, 3, b"{}".to_vec());
        let processed_before = count("processed");
        let decode_before = count("decode_error");

        assert!(ObservedHandler::new(Fixed(true)).handle(&message).await.is_ok());
        let err = ObservedHandler::new(Fixed(false))
            .handle(&message)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Decode { offset: 3, .. }));

        assert!(count("processed") >= processed_before + 1.0);
        assert!(count("decode_error") >= decode_before + 1.0);
    }
}
