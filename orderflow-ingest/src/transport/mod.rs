//! Message transport contract.
//!
//! A transport exposes a topic as a fixed set of independently ordered
//! partitions. Offsets are tracked and committed by the transport itself;
//! consumers only observe delivered messages.

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use orderflow_core::ConfigError;

use crate::error::TransportError;
use crate::message::StreamMessage;

#[cfg(feature = "kafka")]
pub use kafka::{KafkaConfig, KafkaTransport};
pub use memory::{BrokerConfig, MemoryBroker};

/// Where a new subscription starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartOffset {
    /// First retained message.
    #[default]
    Oldest,
    /// Only messages produced after subscribing.
    Newest,
    /// The last committed position, or the oldest message if none.
    Committed,
}

impl fmt::Display for StartOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StartOffset::Oldest => "oldest",
            StartOffset::Newest => "newest",
            StartOffset::Committed => "committed",
        };
        f.write_str(s)
    }
}

impl FromStr for StartOffset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oldest" => Ok(StartOffset::Oldest),
            "newest" => Ok(StartOffset::Newest),
            "committed" => Ok(StartOffset::Committed),
            other => Err(ConfigError::InvalidValue {
                field: "start_offset".to_string(),
                value: other.to_string(),
                reason: "expected one of: oldest, newest, committed".to_string(),
            }),
        }
    }
}

/// Source of messages for one partition.
///
/// `next` must be cancel-safe: dropping its future before completion must not
/// lose a message.
#[async_trait]
pub trait PartitionStream: Send {
    /// `None` means the partition is closed and no more messages will come.
    async fn next(&mut self) -> Option<Result<StreamMessage, TransportError>>;
}

/// An open subscription to a single partition.
pub struct PartitionSubscription {
    topic: String,
    partition: i32,
    stream: Box<dyn PartitionStream>,
}

impl PartitionSubscription {
    pub fn new(topic: impl Into<String>, partition: i32, stream: Box<dyn PartitionStream>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            stream,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    /// Wait for the next delivery. Cancel-safe.
    pub async fn recv(&mut self) -> Option<Result<StreamMessage, TransportError>> {
        self.stream.next().await
    }
}

impl fmt::Debug for PartitionSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionSubscription")
            .field("topic", &self.topic)
            .field("partition", &self.partition)
            .finish_non_exhaustive()
    }
}

/// Partitioned message source.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Partition ids of `topic`, ascending.
    async fn partitions(&self, topic: &str) -> Result<Vec<i32>, TransportError>;

    /// Open an independent subscription to one partition.
    async fn subscribe(
        &self,
        topic: &str,
        partition: i32,
        start: StartOffset,
    ) -> Result<PartitionSubscription, TransportError>;
}
