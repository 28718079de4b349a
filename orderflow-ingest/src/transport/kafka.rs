//! Kafka-backed [`MessageTransport`].
//!
//! Every partition subscription owns its own consumer with a manual
//! single-partition assignment, so partitions are read independently and a
//! slow worker never stalls another partition's fetches. Offsets are stored
//! as messages are handed out and committed by librdkafka's auto-commit
//! timer, which gives the same acknowledgement model as [`super::MemoryBroker`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orderflow_core::ConfigError;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use tracing::{debug, info};

use super::{MessageTransport, PartitionStream, PartitionSubscription, StartOffset};
use crate::error::TransportError;
use crate::message::StreamMessage;

/// Bound on a metadata round trip when enumerating partitions.
const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Kafka connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaConfig {
    brokers: String,
    group_id: String,
    commit_interval: Duration,
    metadata_timeout: Duration,
}

impl KafkaConfig {
    /// `brokers` is a comma-separated `host:port` list.
    pub fn new(
        brokers: impl Into<String>,
        group_id: impl Into<String>,
        commit_interval: Duration,
    ) -> Result<Self, ConfigError> {
        let brokers = brokers.into();
        if brokers.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "kafka_brokers".to_string(),
            });
        }
        let group_id = group_id.into();
        if group_id.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "kafka_group_id".to_string(),
            });
        }
        if commit_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "commit_interval".to_string(),
                value: format!("{:?}", commit_interval),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            brokers,
            group_id,
            commit_interval,
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
        })
    }

    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "true")
            .set(
                "auto.commit.interval.ms",
                self.commit_interval.as_millis().to_string(),
            )
            // `Committed` subscriptions with no stored offset start at the oldest.
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false");
        config
    }
}

/// Consumes topics from a Kafka cluster.
pub struct KafkaTransport {
    config: KafkaConfig,
    metadata: Arc<BaseConsumer>,
}

impl std::fmt::Debug for KafkaTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl KafkaTransport {
    /// Create the client. No broker is contacted until the first call.
    pub fn new(config: KafkaConfig) -> Result<Self, TransportError> {
        let metadata: BaseConsumer = config.client_config().create().map_err(kafka_error)?;
        info!(brokers = %config.brokers, group_id = %config.group_id, "Kafka transport created");
        Ok(Self {
            config,
            metadata: Arc::new(metadata),
        })
    }
}

#[async_trait]
impl MessageTransport for KafkaTransport {
    async fn partitions(&self, topic: &str) -> Result<Vec<i32>, TransportError> {
        let consumer = Arc::clone(&self.metadata);
        let timeout = self.config.metadata_timeout;
        let name = topic.to_string();

        // librdkafka metadata requests block the calling thread.
        let ids = tokio::task::spawn_blocking(move || {
            let metadata = consumer.fetch_metadata(Some(name.as_str()), timeout)?;
            let ids = metadata
                .topics()
                .iter()
                .find(|t| t.name() == name && t.error().is_none())
                .map(|t| t.partitions().iter().map(|p| p.id()).collect::<Vec<i32>>());
            Ok::<_, KafkaError>(ids)
        })
        .await
        .map_err(|e| TransportError::Broker {
            reason: format!("metadata task failed: {}", e),
        })?
        .map_err(kafka_error)?;

        let mut ids = ids.ok_or_else(|| TransportError::UnknownTopic {
            topic: topic.to_string(),
        })?;
        ids.sort_unstable();
        debug!(topic, partitions = ids.len(), "Kafka metadata fetched");
        Ok(ids)
    }

    async fn subscribe(
        &self,
        topic: &str,
        partition: i32,
        start: StartOffset,
    ) -> Result<PartitionSubscription, TransportError> {
        let consumer: StreamConsumer = self.config.client_config().create().map_err(kafka_error)?;

        let mut assignment = TopicPartitionList::new();
        assignment
            .add_partition_offset(topic, partition, start_position(start))
            .map_err(kafka_error)?;
        consumer.assign(&assignment).map_err(kafka_error)?;
        debug!(topic, partition, %start, "Kafka partition assigned");

        let stream = KafkaStream { consumer };
        Ok(PartitionSubscription::new(topic, partition, Box::new(stream)))
    }
}

struct KafkaStream {
    consumer: StreamConsumer,
}

#[async_trait]
impl PartitionStream for KafkaStream {
    async fn next(&mut self) -> Option<Result<StreamMessage, TransportError>> {
        // The borrowed message is copied out before the next await.
        let delivery = match self.consumer.recv().await {
            Ok(message) => Ok(StreamMessage::new(
                message.topic(),
                message.partition(),
                message.offset(),
                message.payload().unwrap_or_default().to_vec(),
            )),
            Err(e) => Err(kafka_error(e)),
        };
        Some(delivery)
    }
}

fn start_position(start: StartOffset) -> Offset {
    match start {
        StartOffset::Oldest => Offset::Beginning,
        StartOffset::Newest => Offset::End,
        StartOffset::Committed => Offset::Stored,
    }
}

fn kafka_error(err: KafkaError) -> TransportError {
    match err {
        KafkaError::ClientConfig(..) | KafkaError::ClientCreation(_) => TransportError::Broker {
            reason: err.to_string(),
        },
        other => TransportError::Unavailable {
            reason: other.to_string(),
        },
    }
}
