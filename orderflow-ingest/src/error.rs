//! Error types for stream consumption.

use orderflow_core::OrderflowError;
use thiserror::Error;

/// Message transport errors.
///
/// Everything except [`TransportError::UnknownTopic`] and
/// [`TransportError::UnknownPartition`] is transient: a worker that sees one
/// reports it and keeps reading.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Unknown topic: {topic}")]
    UnknownTopic { topic: String },

    #[error("Unknown partition {partition} for topic {topic}")]
    UnknownPartition { topic: String, partition: i32 },

    #[error("Topic {topic} has no partitions")]
    NoPartitions { topic: String },

    #[error("Transport unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Broker error: {reason}")]
    Broker { reason: String },
}

impl TransportError {
    /// Whether this error means the addressed stream does not exist.
    pub fn is_unknown_stream(&self) -> bool {
        matches!(
            self,
            Self::UnknownTopic { .. } | Self::UnknownPartition { .. }
        )
    }
}

/// Per-message and pipeline errors.
#[derive(Debug, Clone, Error)]
pub enum IngestError {
    #[error("Failed to decode payload at offset {offset}: {reason}")]
    Decode { offset: i64, reason: String },

    /// The write path refused the record (validation or store failure).
    #[error("Order rejected: {0}")]
    Rejected(#[from] OrderflowError),

    #[error("Handler panicked: {message}")]
    Panicked { message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl IngestError {
    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode_error",
            Self::Rejected(OrderflowError::Validation(_)) => "invalid",
            Self::Rejected(_) => "rejected",
            Self::Panicked { .. } => "panicked",
            Self::Transport(_) => "transport_error",
        }
    }
}

/// Result type alias for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_core::{StorageError, ValidationError};

    #[test]
    fn test_kind_labels() {
        let decode = IngestError::Decode {
            offset: 7,
            reason: "expected value".to_string(),
        };
        assert_eq!(decode.kind(), "decode_error");
        assert!(format!("{}", decode).contains("offset 7"));

        let invalid = IngestError::from(OrderflowError::from(
            ValidationError::RequiredFieldMissing {
                field: "order_uid".to_string(),
            },
        ));
        assert_eq!(invalid.kind(), "invalid");

        let rejected = IngestError::from(OrderflowError::from(StorageError::LockPoisoned));
        assert_eq!(rejected.kind(), "rejected");

        let transport = IngestError::from(TransportError::Unavailable {
            reason: "connection reset".to_string(),
        });
        assert_eq!(transport.kind(), "transport_error");
    }

    #[test]
    fn test_unknown_stream_detection() {
        assert!(TransportError::UnknownTopic {
            topic: "orders".to_string()
        }
        .is_unknown_stream());
        assert!(!TransportError::Unavailable {
            reason: "x".to_string()
        }
        .is_unknown_stream());
    }
}
