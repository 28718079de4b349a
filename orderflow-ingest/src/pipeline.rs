//! Ingestion pipeline: one worker per partition.
//!
//! Each worker waits on its partition subscription and the shared shutdown
//! signal at the same time. A delivered message is handled to completion
//! before the worker looks at either again, so shutdown never interrupts a
//! message midway. A slow handler only holds back its own partition.
//!
//! # Example
//!
//! ```ignore
//! let pipeline = IngestionPipeline::new(Arc::new(broker), PipelineConfig::new("orders"));
//! let handle = pipeline.start(PanicGuard::new(OrderHandler::new(service))).await?;
//!
//! // Later: signal every worker and wait for in-flight messages to finish.
//! let snapshot = handle.stop().await;
//! ```

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{IngestError, IngestResult, TransportError};
use crate::handler::MessageHandler;
use crate::metrics::{PipelineMetrics, PipelineSnapshot};
use crate::transport::{MessageTransport, PartitionSubscription, StartOffset};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Settings fixed when the pipeline starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub topic: String,
    pub start_offset: StartOffset,
}

impl PipelineConfig {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            start_offset: StartOffset::default(),
        }
    }

    pub fn with_start_offset(mut self, start_offset: StartOffset) -> Self {
        self.start_offset = start_offset;
        self
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Why a partition worker exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The shutdown signal was observed.
    Shutdown,
    /// The transport closed the partition stream.
    StreamClosed,
}

/// Consumes every partition of one topic.
pub struct IngestionPipeline<T: ?Sized> {
    transport: Arc<T>,
    config: PipelineConfig,
    metrics: Arc<PipelineMetrics>,
}

impl<T: MessageTransport + ?Sized + 'static> IngestionPipeline<T> {
    pub fn new(transport: Arc<T>, config: PipelineConfig) -> Self {
        Self {
            transport,
            config,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Subscribe to every partition and spawn one worker per partition.
    ///
    /// Any failure to enumerate or subscribe is returned before a single
    /// message is consumed; workers already spawned are aborted.
    pub async fn start<H>(&self, handler: H) -> IngestResult<PipelineHandle>
    where
        H: MessageHandler + 'static,
    {
        let topic = self.config.topic.as_str();
        let partitions = self.transport.partitions(topic).await?;
        if partitions.is_empty() {
            return Err(TransportError::NoPartitions {
                topic: topic.to_string(),
            }
            .into());
        }

        let handler: Arc<dyn MessageHandler> = Arc::new(handler);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut workers = JoinSet::new();

        for &partition in &partitions {
            let subscription = self
                .transport
                .subscribe(topic, partition, self.config.start_offset)
                .await?;
            workers.spawn(partition_worker(
                subscription,
                Arc::clone(&handler),
                Arc::clone(&self.metrics),
                shutdown_rx.clone(),
            ));
        }

        info!(
            topic,
            partitions = partitions.len(),
            start_offset = %self.config.start_offset,
            "Ingestion pipeline started"
        );

        Ok(PipelineHandle {
            topic: topic.to_string(),
            partitions,
            shutdown_tx,
            workers,
            metrics: Arc::clone(&self.metrics),
        })
    }
}

/// Running pipeline. Dropping it without [`PipelineHandle::stop`] aborts
/// the workers.
pub struct PipelineHandle {
    topic: String,
    partitions: Vec<i32>,
    shutdown_tx: watch::Sender<bool>,
    workers: JoinSet<(i32, WorkerExit)>,
    metrics: Arc<PipelineMetrics>,
}

impl PipelineHandle {
    pub fn partitions(&self) -> &[i32] {
        &self.partitions
    }

    pub fn metrics(&self) -> PipelineSnapshot {
        self.metrics.snapshot()
    }

    /// Signal every worker and wait until all of them have exited.
    ///
    /// Messages already being handled run to completion first.
    pub async fn stop(self) -> PipelineSnapshot {
        // Receivers only disappear when every worker already exited.
        let _ = self.shutdown_tx.send(true);
        self.join().await
    }

    /// Wait for every worker to exit on its own (streams closed).
    pub async fn join(mut self) -> PipelineSnapshot {
        while let Some(joined) = self.workers.join_next().await {
            match joined {
                Ok((partition, exit)) => {
                    debug!(topic = %self.topic, partition, ?exit, "Partition worker joined");
                }
                Err(e) => {
                    error!(topic = %self.topic, error = %e, "Partition worker terminated abnormally");
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        info!(
            topic = %self.topic,
            delivered = snapshot.delivered,
            processed = snapshot.processed,
            failed = snapshot.failed,
            panicked = snapshot.panicked,
            transport_errors = snapshot.transport_errors,
            "Ingestion pipeline stopped"
        );
        snapshot
    }
}

// ============================================================================
// WORKER
// ============================================================================

async fn partition_worker(
    mut subscription: PartitionSubscription,
    handler: Arc<dyn MessageHandler>,
    metrics: Arc<PipelineMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> (i32, WorkerExit) {
    let partition = subscription.partition();
    let topic = subscription.topic().to_string();
    debug!(topic = %topic, partition, "Partition worker started");

    let exit = loop {
        if *shutdown_rx.borrow() {
            break WorkerExit::Shutdown;
        }

        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break WorkerExit::Shutdown;
                }
            }

            delivery = subscription.recv() => match delivery {
                Some(Ok(message)) => {
                    metrics.delivered.fetch_add(1, Ordering::Relaxed);
                    match handler.handle(&message).await {
                        Ok(()) => {
                            metrics.processed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(IngestError::Panicked { .. }) => {
                            metrics.panicked.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            metrics.failed.fetch_add(1, Ordering::Relaxed);
                            warn!(
                                topic = %topic,
                                partition,
                                offset = message.offset,
                                kind = e.kind(),
                                error = %e,
                                "Message dropped"
                            );
                        }
                    }
                }
                Some(Err(e)) => {
                    metrics.transport_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(topic = %topic, partition, error = %e, "Transport error");
                }
                None => break WorkerExit::StreamClosed,
            },
        }
    };

    debug!(topic = %topic, partition, ?exit, "Partition worker exiting");
    (partition, exit)
}
