//! Process lifecycle.
//!
//! Startup order is fixed: the cache is preloaded before the listener is
//! bound, the pipeline starts consuming or the HTTP server accepts a
//! connection. Shutdown runs in reverse: HTTP first (bounded by the grace
//! period), then the pipeline drains in-flight messages, then the commit
//! task, then the pool.
//!
//! Orders are consumed from the in-process [`MemoryBroker`] unless
//! `ORDERFLOW_KAFKA_BROKERS` is set, in which case the `kafka` feature must be
//! enabled and the publish route is not mounted.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use orderflow_ingest::{
    BrokerConfig, IngestionPipeline, MemoryBroker, MessageTransport, OrderHandler, PanicGuard,
    PipelineConfig, PipelineSnapshot,
};
use orderflow_storage::{CachePreloader, MemoryOrderCache, OrderRepository, OrderService};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::{AppConfig, IngestSettings};
use crate::db::PgOrderRepository;
use crate::error::{ApiError, ApiResult};
use crate::routes::{create_api_router, create_consumer_router};
use crate::state::{AppState, SharedOrders};
use crate::telemetry::ObservedHandler;

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Orders loaded into the cache at boot.
    pub preloaded: usize,
    /// Pipeline counters at the moment every worker had exited.
    pub pipeline: PipelineSnapshot,
    /// Periodic auto-commit cycles run before shutdown. Always zero when
    /// consuming Kafka, whose client commits on its own timer.
    pub commit_cycles: u64,
}

/// A fully wired service over the order repository `R`.
pub struct App<R> {
    config: AppConfig,
    repository: Arc<R>,
    cache: Arc<MemoryOrderCache>,
    service: Arc<OrderService<Arc<R>, MemoryOrderCache>>,
    broker: MemoryBroker,
    transport: Arc<dyn MessageTransport>,
    /// Orders arrive from outside the process.
    external_stream: bool,
    database: Option<PgOrderRepository>,
}

impl App<PgOrderRepository> {
    /// Build the service on PostgreSQL.
    ///
    /// The database must answer a ping; the schema is applied when
    /// configured. Either failure is fatal.
    pub async fn connect(config: AppConfig) -> ApiResult<Self> {
        let repository = PgOrderRepository::from_config(&config.db)?;
        repository.ping().await.map_err(|e| {
            error!(
                host = %config.db.host,
                port = config.db.port,
                dbname = %config.db.dbname,
                "Database unreachable at startup"
            );
            e
        })?;
        if config.apply_schema {
            repository.apply_schema().await?;
        }

        let database = repository.clone();
        let mut app = Self::from_parts(config, Arc::new(repository))?;
        app.database = Some(database);
        Ok(app)
    }
}

impl<R: OrderRepository + 'static> App<R> {
    /// Wire cache, service and broker around an existing repository.
    pub fn from_parts(config: AppConfig, repository: Arc<R>) -> ApiResult<Self> {
        let cache = Arc::new(MemoryOrderCache::new(config.cache.capacity)?);
        let service = Arc::new(
            OrderService::new(Arc::clone(&repository), Arc::clone(&cache))
                .with_read_policy(config.cache.read_policy),
        );

        let broker = MemoryBroker::new(BrokerConfig::new(config.ingest.commit_interval)?);
        let transport: Arc<dyn MessageTransport> = match &config.ingest.kafka_brokers {
            Some(brokers) => kafka_transport(&config.ingest, brokers)?,
            None => {
                broker.create_topic(&config.ingest.topic, config.ingest.partitions)?;
                Arc::new(broker.clone())
            }
        };
        let external_stream = config.ingest.kafka_brokers.is_some();

        info!(
            cache_capacity = config.cache.capacity,
            read_policy = ?config.cache.read_policy,
            topic = %config.ingest.topic,
            external_stream,
            "Application wired"
        );

        Ok(Self {
            config,
            repository,
            cache,
            service,
            broker,
            transport,
            external_stream,
            database: None,
        })
    }

    /// The in-process broker. The pipeline consumes it and the publish route
    /// feeds it unless an external stream is configured.
    pub fn broker(&self) -> &MemoryBroker {
        &self.broker
    }

    pub fn cache(&self) -> &Arc<MemoryOrderCache> {
        &self.cache
    }

    /// The HTTP router over this app's read path and broker.
    pub fn router(&self) -> Router {
        let orders: SharedOrders = self.service.clone();
        let state = AppState::new(orders, self.broker.clone());
        if self.external_stream {
            create_consumer_router(state)
        } else {
            create_api_router(state)
        }
    }

    /// Preload, then bind the configured address and serve until `shutdown`
    /// resolves.
    pub async fn run<F>(self, shutdown: F) -> ApiResult<RunSummary>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = self.config.http.socket_addr()?;
        let bind = async move {
            TcpListener::bind(addr)
                .await
                .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))
        };
        self.launch(bind, shutdown).await
    }

    /// Run the service on an already bound listener until `shutdown`
    /// resolves or the HTTP server fails.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> ApiResult<RunSummary>
    where
        F: Future<Output = ()> + Send,
    {
        self.launch(async { Ok(listener) }, shutdown).await
    }

    async fn launch<B, F>(self, bind: B, shutdown: F) -> ApiResult<RunSummary>
    where
        B: Future<Output = ApiResult<TcpListener>> + Send,
        F: Future<Output = ()> + Send,
    {
        // 1. Warm the cache. Nothing is bound, consumed or served before this ends.
        let report = CachePreloader::new(Arc::clone(&self.repository), Arc::clone(&self.cache))
            .preload()
            .await
            .map_err(|e| ApiError::database_error(format!("Cache preload failed: {}", e)))?;

        let listener = bind.await?;

        // 2. In-process offset commits run on their own clock.
        let (commit_tx, commit_rx) = watch::channel(false);
        let commit_task = (!self.external_stream)
            .then(|| tokio::spawn(self.broker.clone().auto_commit_task(commit_rx)));

        // 3. Consume every partition. The handler chain is fixed from here on.
        let pipeline = IngestionPipeline::new(
            Arc::clone(&self.transport),
            PipelineConfig::new(self.config.ingest.topic.clone())
                .with_start_offset(self.config.ingest.start_offset),
        );
        let handler = ObservedHandler::new(PanicGuard::new(OrderHandler::new(Arc::clone(
            &self.service,
        ))));
        let pipeline = match pipeline.start(handler).await {
            Ok(handle) => handle,
            Err(e) => {
                let _ = commit_tx.send(true);
                if let Some(task) = commit_task {
                    let _ = task.await;
                }
                return Err(e.into());
            }
        };

        // 4. Serve HTTP.
        let local_addr = listener.local_addr().ok();
        let (http_tx, mut http_rx) = watch::channel(false);
        let router = self.router();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = http_rx.wait_for(|stop| *stop).await;
                })
                .await
        });
        info!(addr = ?local_addr, preloaded = report.loaded, "orderflow is online");

        tokio::pin!(shutdown);
        let server_exit = tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                None
            }
            result = &mut server => Some(result),
        };

        // 5. Stop in reverse order.
        let _ = http_tx.send(true);
        let server_result = match server_exit {
            Some(result) => result,
            None => match tokio::time::timeout(self.config.http.shutdown_grace, &mut server).await
            {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        grace_ms = self.config.http.shutdown_grace.as_millis() as u64,
                        "HTTP drain exceeded grace period; aborting open connections"
                    );
                    server.abort();
                    Ok(Ok(()))
                }
            },
        };

        let snapshot = pipeline.stop().await;

        let _ = commit_tx.send(true);
        let commit_cycles = match commit_task {
            Some(task) => task.await.unwrap_or_else(|e| {
                warn!(error = %e, "Auto-commit task did not finish cleanly");
                0
            }),
            None => 0,
        };

        if let Some(database) = &self.database {
            database.close();
        }

        info!(
            preloaded = report.loaded,
            delivered = snapshot.delivered,
            processed = snapshot.processed,
            failed = snapshot.failed,
            panicked = snapshot.panicked,
            commit_cycles,
            "orderflow stopped"
        );

        match server_result {
            Ok(Ok(())) => Ok(RunSummary {
                preloaded: report.loaded,
                pipeline: snapshot,
                commit_cycles,
            }),
            Ok(Err(e)) => Err(ApiError::internal_error(format!("Server error: {}", e))),
            Err(e) => Err(ApiError::internal_error(format!("Server task failed: {}", e))),
        }
    }
}

#[cfg(feature = "kafka")]
fn kafka_transport(
    ingest: &IngestSettings,
    brokers: &str,
) -> ApiResult<Arc<dyn MessageTransport>> {
    use orderflow_ingest::{KafkaConfig, KafkaTransport};

    let config = KafkaConfig::new(brokers, ingest.consumer_group.clone(), ingest.commit_interval)?;
    Ok(Arc::new(KafkaTransport::new(config)?))
}

#[cfg(not(feature = "kafka"))]
fn kafka_transport(
    _ingest: &IngestSettings,
    brokers: &str,
) -> ApiResult<Arc<dyn MessageTransport>> {
    Err(orderflow_core::ConfigError::InvalidValue {
        field: crate::constants::ENV_KAFKA_BROKERS.to_string(),
        value: brokers.to_string(),
        reason: "built without the kafka feature".to_string(),
    }
    .into())
}

/// Resolves on SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
