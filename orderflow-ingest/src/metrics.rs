//! Lock-free pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by all partition workers of one pipeline.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Messages received from the transport.
    pub delivered: AtomicU64,

    /// Messages the handler accepted.
    pub processed: AtomicU64,

    /// Messages the handler rejected (decode, validation, store).
    pub failed: AtomicU64,

    /// Messages whose handler panicked.
    pub panicked: AtomicU64,

    /// Transient transport errors observed by workers.
    pub transport_errors: AtomicU64,
}

impl PipelineMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pipeline metrics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSnapshot {
    pub delivered: u64,
    pub processed: u64,
    pub failed: u64,
    pub panicked: u64,
    pub transport_errors: u64,
}

impl PipelineSnapshot {
    /// Delivered messages that have finished handling, successfully or not.
    pub fn settled(&self) -> u64 {
        self.processed + self.failed + self.panicked
    }
}
