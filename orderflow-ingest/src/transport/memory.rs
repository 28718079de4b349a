//! In-process partitioned broker.
//!
//! Each partition is an append-only log with a high watermark published on a
//! `watch` channel. Subscribers wait on the watermark, so producing never
//! blocks on consumers. Delivered positions are committed by a periodic task
//! regardless of whether the consumer's handler succeeded, which gives the
//! usual auto-commit trade-off: a crash can lose or replay up to one commit
//! interval of messages.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use orderflow_core::ConfigError;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace};

use super::{MessageTransport, PartitionStream, PartitionSubscription, StartOffset};
use crate::error::TransportError;
use crate::message::StreamMessage;

/// Default auto-commit period.
pub const DEFAULT_COMMIT_INTERVAL: Duration = Duration::from_secs(5);

/// Broker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    commit_interval: Duration,
}

impl BrokerConfig {
    /// `commit_interval` is how often delivered offsets are copied to
    /// committed offsets. It must be non-zero.
    pub fn new(commit_interval: Duration) -> Result<Self, ConfigError> {
        if commit_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "commit_interval".to_string(),
                value: format!("{:?}", commit_interval),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(Self { commit_interval })
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            commit_interval: DEFAULT_COMMIT_INTERVAL,
        }
    }
}

struct PartitionLog {
    records: RwLock<Vec<Vec<u8>>>,
    /// Offset one past the newest record.
    watermark: watch::Sender<i64>,
    /// Offset one past the newest record handed to a subscriber.
    delivered: AtomicI64,
    /// Next offset a `Committed` subscription starts from.
    committed: AtomicI64,
    pending_errors: Mutex<VecDeque<TransportError>>,
    closed: AtomicBool,
}

impl PartitionLog {
    fn new() -> Self {
        let (watermark, _) = watch::channel(0);
        Self {
            records: RwLock::new(Vec::new()),
            watermark,
            delivered: AtomicI64::new(0),
            committed: AtomicI64::new(0),
            pending_errors: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn append(&self, payload: Vec<u8>) -> Result<i64, TransportError> {
        let offset = {
            let mut records = self.records.write().map_err(|_| TransportError::Broker {
                reason: "partition log lock poisoned".to_string(),
            })?;
            records.push(payload);
            records.len() as i64 - 1
        };
        // Concurrent producers may publish out of order; the watermark only grows.
        self.watermark.send_modify(|hw| *hw = (*hw).max(offset + 1));
        Ok(offset)
    }

    fn read(&self, offset: i64) -> Result<Option<Vec<u8>>, TransportError> {
        let records = self.records.read().map_err(|_| TransportError::Broker {
            reason: "partition log lock poisoned".to_string(),
        })?;
        Ok(usize::try_from(offset)
            .ok()
            .and_then(|idx| records.get(idx))
            .cloned())
    }

    fn errors(&self) -> MutexGuard<'_, VecDeque<TransportError>> {
        self.pending_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn wake(&self) {
        self.watermark.send_modify(|_| {});
    }

    fn high_watermark(&self) -> i64 {
        *self.watermark.borrow()
    }

    /// Returns whether the committed offset moved.
    fn commit(&self) -> bool {
        let delivered = self.delivered.load(Ordering::SeqCst);
        self.committed.fetch_max(delivered, Ordering::SeqCst) < delivered
    }
}

struct BrokerInner {
    topics: RwLock<HashMap<String, Vec<Arc<PartitionLog>>>>,
    config: BrokerConfig,
}

/// In-process [`MessageTransport`] with produce, auto-commit and fault
/// injection. Cloning shares the same broker.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

impl std::fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBroker")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl MemoryBroker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                topics: RwLock::new(HashMap::new()),
                config,
            }),
        }
    }

    /// Create `topic` with partitions `0..partitions`.
    ///
    /// Re-creating an existing topic with the same partition count is a no-op.
    pub fn create_topic(&self, topic: &str, partitions: i32) -> Result<(), TransportError> {
        if partitions <= 0 {
            return Err(TransportError::NoPartitions {
                topic: topic.to_string(),
            });
        }
        let mut topics = self.inner.topics.write().map_err(|_| poisoned())?;
        match topics.get(topic) {
            Some(existing) if existing.len() == partitions as usize => Ok(()),
            Some(existing) => Err(TransportError::Broker {
                reason: format!(
                    "topic {} already exists with {} partitions",
                    topic,
                    existing.len()
                ),
            }),
            None => {
                let logs = (0..partitions).map(|_| Arc::new(PartitionLog::new())).collect();
                topics.insert(topic.to_string(), logs);
                info!(topic, partitions, "Topic created");
                Ok(())
            }
        }
    }

    fn log(&self, topic: &str, partition: i32) -> Result<Arc<PartitionLog>, TransportError> {
        let topics = self.inner.topics.read().map_err(|_| poisoned())?;
        let logs = topics.get(topic).ok_or_else(|| TransportError::UnknownTopic {
            topic: topic.to_string(),
        })?;
        usize::try_from(partition)
            .ok()
            .and_then(|idx| logs.get(idx))
            .cloned()
            .ok_or_else(|| TransportError::UnknownPartition {
                topic: topic.to_string(),
                partition,
            })
    }

    fn all_logs(&self) -> Vec<Arc<PartitionLog>> {
        self.inner
            .topics
            .read()
            .map(|topics| topics.values().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Append a payload and return its offset.
    pub fn produce(
        &self,
        topic: &str,
        partition: i32,
        payload: Vec<u8>,
    ) -> Result<i64, TransportError> {
        let offset = self.log(topic, partition)?.append(payload)?;
        trace!(topic, partition, offset, "Message produced");
        Ok(offset)
    }

    /// Deliver `error` to the current subscribers of one partition before
    /// their next message.
    pub fn inject_error(
        &self,
        topic: &str,
        partition: i32,
        error: TransportError,
    ) -> Result<(), TransportError> {
        let log = self.log(topic, partition)?;
        log.errors().push_back(error);
        log.wake();
        Ok(())
    }

    pub fn high_watermark(&self, topic: &str, partition: i32) -> Result<i64, TransportError> {
        Ok(self.log(topic, partition)?.high_watermark())
    }

    pub fn delivered_offset(&self, topic: &str, partition: i32) -> Result<i64, TransportError> {
        Ok(self.log(topic, partition)?.delivered.load(Ordering::SeqCst))
    }

    pub fn committed_offset(&self, topic: &str, partition: i32) -> Result<i64, TransportError> {
        Ok(self.log(topic, partition)?.committed.load(Ordering::SeqCst))
    }

    /// Copy every delivered offset to its committed offset.
    ///
    /// Returns the number of partitions whose committed offset moved.
    pub fn commit_offsets(&self) -> usize {
        self.all_logs().iter().filter(|log| log.commit()).count()
    }

    /// End every partition stream once subscribers have caught up.
    pub fn close(&self) {
        for log in self.all_logs() {
            log.closed.store(true, Ordering::SeqCst);
            log.wake();
        }
        info!("Broker closed");
    }

    /// Periodically commit delivered offsets until `shutdown_rx` turns true,
    /// then commit once more. Returns the number of commit cycles run.
    pub async fn auto_commit_task(self, mut shutdown_rx: watch::Receiver<bool>) -> u64 {
        let mut ticker = interval(self.inner.config.commit_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cycles = 0u64;

        debug!(
            commit_interval_ms = self.inner.config.commit_interval.as_millis() as u64,
            "Auto-commit task started"
        );

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    cycles += 1;
                    let moved = self.commit_offsets();
                    if moved > 0 {
                        trace!(partitions = moved, "Offsets committed");
                    }
                }
            }
        }

        let moved = self.commit_offsets();
        info!(cycles, final_partitions = moved, "Auto-commit task stopped");
        cycles
    }
}

fn poisoned() -> TransportError {
    TransportError::Broker {
        reason: "topic registry lock poisoned".to_string(),
    }
}

struct MemoryStream {
    topic: String,
    partition: i32,
    log: Arc<PartitionLog>,
    next_offset: i64,
    watermark: watch::Receiver<i64>,
}

#[async_trait]
impl PartitionStream for MemoryStream {
    async fn next(&mut self) -> Option<Result<StreamMessage, TransportError>> {
        loop {
            if let Some(err) = self.log.errors().pop_front() {
                return Some(Err(err));
            }

            let high_watermark = *self.watermark.borrow_and_update();
            if self.next_offset < high_watermark {
                let offset = self.next_offset;
                let payload = match self.log.read(offset) {
                    Ok(Some(payload)) => payload,
                    Ok(None) => {
                        return Some(Err(TransportError::Broker {
                            reason: format!("offset {} below watermark but missing", offset),
                        }))
                    }
                    Err(e) => return Some(Err(e)),
                };
                self.next_offset += 1;
                self.log
                    .delivered
                    .fetch_max(self.next_offset, Ordering::SeqCst);
                return Some(Ok(StreamMessage::new(
                    self.topic.clone(),
                    self.partition,
                    offset,
                    payload,
                )));
            }

            if self.log.closed.load(Ordering::SeqCst) {
                return None;
            }
            if self.watermark.changed().await.is_err() {
                return None;
            }
        }
    }
}

#[async_trait]
impl MessageTransport for MemoryBroker {
    async fn partitions(&self, topic: &str) -> Result<Vec<i32>, TransportError> {
        let topics = self.inner.topics.read().map_err(|_| poisoned())?;
        let logs = topics.get(topic).ok_or_else(|| TransportError::UnknownTopic {
            topic: topic.to_string(),
        })?;
        Ok((0..logs.len() as i32).collect())
    }

    async fn subscribe(
        &self,
        topic: &str,
        partition: i32,
        start: StartOffset,
    ) -> Result<PartitionSubscription, TransportError> {
        let log = self.log(topic, partition)?;
        let next_offset = match start {
            StartOffset::Oldest => 0,
            StartOffset::Newest => log.high_watermark(),
            StartOffset::Committed => log.committed.load(Ordering::SeqCst),
        };
        debug!(topic, partition, %start, next_offset, "Partition subscribed");

        let stream = MemoryStream {
            topic: topic.to_string(),
            partition,
            watermark: log.watermark.subscribe(),
            log,
            next_offset,
        };
        Ok(PartitionSubscription::new(topic, partition, Box::new(stream)))
    }
}
