//! Ingestion pipeline behaviour against the in-process broker.
//!
//! Covers partition isolation under handler faults, drain-on-stop, transient
//! transport errors and the full decode -> validate -> persist -> cache path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use orderflow_ingest::{
    BrokerConfig, IngestResult, IngestionPipeline, MemoryBroker, MessageHandler,
    MessageTransport, OrderHandler, PanicGuard, PipelineConfig, PipelineSnapshot, StartOffset, StreamMessage, TransportError,
};
use orderflow_storage::{InMemoryOrderRepository, MemoryOrderCache, OrderCache, OrderService};
use orderflow_test_utils::{order_payload, sample_order};
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};

const TOPIC: &str = "orders";
const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// HELPERS
// ============================================================================

fn broker(partitions: i32) -> MemoryBroker {
    let broker = MemoryBroker::new(BrokerConfig::default());
    broker.create_topic(TOPIC, partitions).unwrap();
    broker
}

fn pipeline(broker: &MemoryBroker) -> IngestionPipeline<MemoryBroker> {
    IngestionPipeline::new(Arc::new(broker.clone()), PipelineConfig::new(TOPIC))
}

/// Poll `snapshot` until `done` holds or the deadline passes.
async fn wait_for(
    snapshot: impl Fn() -> PipelineSnapshot,
    done: impl Fn(&PipelineSnapshot) -> bool,
) -> PipelineSnapshot {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let current = snapshot();
        if done(&current) || tokio::time::Instant::now() >= deadline {
            return current;
        }
        sleep(Duration::from_millis(5)).await;
    }
}

/// Records payloads; panics on the payload `panic`.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(i32, i64, String)>>,
}

impl Recorder {
    fn payloads(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl MessageHandler for Recorder {
    async fn handle(&self, message: &StreamMessage) -> IngestResult<()> {
        let payload = String::from_utf8_lossy(&message.payload).to_string();
        if payload == "panic" {
            panic!("handler fault on partition {}", message.partition);
        }
        self.seen
            .lock()
            .unwrap()
            .push((message.partition, message.offset, payload));
        Ok(())
    }
}

/// Blocks inside the handler until released.
struct Gate {
    entered: Notify,
    release: Notify,
    completed: AtomicBool,
}

#[async_trait]
impl MessageHandler for Gate {
    async fn handle(&self, _message: &StreamMessage) -> IngestResult<()> {
        self.entered.notify_one();
        self.release.notified().await;
        self.completed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fault_on_one_partition_does_not_stop_any_partition() {
    let broker = broker(2);
    let recorder = Arc::new(Recorder::default());
    let pipeline = pipeline(&broker);
    let handle = pipeline
        .start(PanicGuard::new(Arc::clone(&recorder)))
        .await
        .unwrap();

    broker.produce(TOPIC, 0, b"panic".to_vec()).unwrap();
    broker.produce(TOPIC, 0, b"after-fault".to_vec()).unwrap();
    broker.produce(TOPIC, 1, b"other-partition".to_vec()).unwrap();

    let metrics = pipeline.metrics();
    let snapshot = wait_for(|| metrics.snapshot(), |s| s.settled() == 3).await;
    assert_eq!(snapshot.panicked, 1);
    assert_eq!(snapshot.processed, 2);

    let mut payloads = recorder.payloads();
    payloads.sort();
    assert_eq!(payloads, vec!["after-fault", "other-partition"]);

    // The faulting partition keeps consuming afterwards.
    broker.produce(TOPIC, 0, b"later".to_vec()).unwrap();
    let snapshot = wait_for(|| metrics.snapshot(), |s| s.processed == 3).await;
    assert_eq!(snapshot.processed, 3);

    handle.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_waits_for_in_flight_message() {
    let broker = broker(1);
    let gate = Arc::new(Gate {
        entered: Notify::new(),
        release: Notify::new(),
        completed: AtomicBool::new(false),
    });
    let pipeline = pipeline(&broker);
    let handle = pipeline.start(Arc::clone(&gate)).await.unwrap();

    broker.produce(TOPIC, 0, b"first".to_vec()).unwrap();
    broker.produce(TOPIC, 0, b"second".to_vec()).unwrap();
    timeout(WAIT, gate.entered.notified()).await.unwrap();

    let mut stopping = tokio::spawn(handle.stop());
    assert!(
        timeout(Duration::from_millis(100), &mut stopping).await.is_err(),
        "stop returned while a message was still being handled"
    );
    assert!(!gate.completed.load(Ordering::SeqCst));

    gate.release.notify_one();
    let snapshot = timeout(WAIT, stopping).await.unwrap().unwrap();

    assert!(gate.completed.load(Ordering::SeqCst));
    assert_eq!(snapshot.delivered, 1);
    assert_eq!(snapshot.processed, 1);
}

#[tokio::test]
async fn test_partition_order_is_preserved() {
    let broker = broker(3);
    let recorder = Arc::new(Recorder::default());
    let pipeline = pipeline(&broker);
    let handle = pipeline.start(Arc::clone(&recorder)).await.unwrap();

    for i in 0..30 {
        broker
            .produce(TOPIC, i % 3, format!("m{}", i).into_bytes())
            .unwrap();
    }
    let metrics = pipeline.metrics();
    wait_for(|| metrics.snapshot(), |s| s.processed == 30).await;
    handle.stop().await;

    let seen = recorder.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 30);
    for partition in 0..3 {
        let offsets: Vec<i64> = seen
            .iter()
            .filter(|(p, _, _)| *p == partition)
            .map(|(_, o, _)| *o)
            .collect();
        assert_eq!(offsets, (0..10).collect::<Vec<i64>>());
    }
}

#[tokio::test]
async fn test_pipeline_over_transport_chosen_at_runtime() {
    let broker = broker(2);
    let transport: Arc<dyn MessageTransport> = Arc::new(broker.clone());
    let pipeline = IngestionPipeline::new(transport, PipelineConfig::new(TOPIC));
    let recorder = Arc::new(Recorder::default());
    let handle = pipeline.start(Arc::clone(&recorder)).await.unwrap();
    assert_eq!(handle.partitions(), &[0, 1]);

    broker.produce(TOPIC, 1, b"dynamic".to_vec()).unwrap();
    let metrics = pipeline.metrics();
    wait_for(|| metrics.snapshot(), |s| s.processed == 1).await;
    handle.stop().await;

    assert_eq!(recorder.payloads(), vec!["dynamic"]);
}

#[tokio::test]
async fn test_transport_error_keeps_worker_running() {
    let broker = broker(1);
    let recorder = Arc::new(Recorder::default());
    let pipeline = pipeline(&broker);
    let handle = pipeline.start(Arc::clone(&recorder)).await.unwrap();

    broker
        .inject_error(
            TOPIC,
            0,
            TransportError::Unavailable {
                reason: "connection reset".to_string(),
            },
        )
        .unwrap();
    broker.produce(TOPIC, 0, b"after-error".to_vec()).unwrap();

    let metrics = pipeline.metrics();
    let snapshot = wait_for(|| metrics.snapshot(), |s| s.processed == 1).await;
    assert_eq!(snapshot.transport_errors, 1);
    assert_eq!(recorder.payloads(), vec!["after-error"]);

    handle.stop().await;
}

#[tokio::test]
async fn test_closed_streams_end_workers() {
    let broker = broker(2);
    broker.produce(TOPIC, 1, b"backlog".to_vec()).unwrap();
    let recorder = Arc::new(Recorder::default());
    let handle = pipeline(&broker)
        .start(Arc::clone(&recorder))
        .await
        .unwrap();

    broker.close();
    let snapshot = timeout(WAIT, handle.join()).await.unwrap();
    assert_eq!(snapshot.processed, 1);
}

#[tokio::test]
async fn test_start_fails_for_unknown_topic() {
    let broker = broker(1);
    let pipeline = IngestionPipeline::new(
        Arc::new(broker.clone()),
        PipelineConfig::new("payments").with_start_offset(StartOffset::Newest),
    );
    let result = pipeline.start(Arc::new(Recorder::default())).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_orders_flow_into_store_and_cache() {
    let broker = broker(2);
    let repo = Arc::new(InMemoryOrderRepository::new());
    let cache = Arc::new(MemoryOrderCache::new(8).unwrap());
    let service = Arc::new(OrderService::new(Arc::clone(&repo), Arc::clone(&cache)));

    let pipeline = pipeline(&broker);
    let handle = pipeline
        .start(PanicGuard::new(OrderHandler::new(Arc::clone(&service))))
        .await
        .unwrap();

    let valid = sample_order("order-valid-0001");
    let mut invalid = sample_order("order-invalid-01");
    invalid.items.clear();

    broker.produce(TOPIC, 0, order_payload(&valid)).unwrap();
    broker.produce(TOPIC, 1, b"{\"order_uid\":".to_vec()).unwrap();
    broker.produce(TOPIC, 1, order_payload(&invalid)).unwrap();
    broker.produce(TOPIC, 0, order_payload(&valid)).unwrap();

    let metrics = pipeline.metrics();
    let snapshot = wait_for(|| metrics.snapshot(), |s| s.settled() == 4).await;
    handle.stop().await;

    assert_eq!(snapshot.processed, 1);
    assert_eq!(snapshot.failed, 3);
    assert_eq!(repo.len(), 1);
    assert!(repo.contains("order-valid-0001"));
    assert_eq!(cache.len(), 1);
    assert!(cache.get("order-valid-0001").is_some());
    assert!(cache.get("order-invalid-01").is_none());
}
