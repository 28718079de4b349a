//! orderflow Ingest - partitioned stream consumption
//!
//! Consumes every partition of a topic with one worker per partition and
//! dispatches each message, in partition order, to a [`MessageHandler`].
//! Failures are contained to the message that caused them: decode,
//! validation and store errors are logged and the message dropped, panics
//! are caught by [`PanicGuard`].

pub mod error;
pub mod handler;
pub mod message;
pub mod metrics;
pub mod pipeline;
pub mod transport;

pub use error::{IngestError, IngestResult, TransportError};
pub use handler::{MessageHandler, OrderHandler, PanicGuard};
pub use message::StreamMessage;
pub use metrics::{PipelineMetrics, PipelineSnapshot};
pub use pipeline::{IngestionPipeline, PipelineConfig, PipelineHandle, WorkerExit};
#[cfg(feature = "kafka")]
pub use transport::{KafkaConfig, KafkaTransport};
pub use transport::{
    BrokerConfig, MemoryBroker, MessageTransport, PartitionStream, PartitionSubscription,
    StartOffset,
};
