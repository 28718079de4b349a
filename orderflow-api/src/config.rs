//! Process configuration.
//!
//! Everything is read from `ORDERFLOW_*` environment variables. Optional
//! settings fall back to their defaults when unset or unparsable. The cache
//! capacity, the consumer start offset and the commit interval are validated
//! and fail startup.

use std::net::SocketAddr;
use std::time::Duration;

use orderflow_core::ConfigError;
use orderflow_ingest::StartOffset;
use orderflow_storage::{ReadPolicy, MAX_CACHE_CAPACITY};

use crate::constants::*;
use crate::db::DbConfig;

/// Cache sizing and read policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub capacity: usize,
    pub read_policy: ReadPolicy,
}

/// Stream topic and consumer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSettings {
    pub topic: String,
    pub partitions: i32,
    pub start_offset: StartOffset,
    pub commit_interval: Duration,
    /// Kafka bootstrap servers. `None` consumes the in-process broker.
    pub kafka_brokers: Option<String>,
    pub consumer_group: String,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            partitions: DEFAULT_TOPIC_PARTITIONS,
            start_offset: StartOffset::Oldest,
            commit_interval: Duration::from_millis(DEFAULT_COMMIT_INTERVAL_MS),
            kafka_brokers: None,
            consumer_group: DEFAULT_KAFKA_GROUP_ID.to_string(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub bind: String,
    pub port: u16,
    /// Upper bound on waiting for in-flight requests at shutdown.
    pub shutdown_grace: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_API_BIND.to_string(),
            port: DEFAULT_API_PORT,
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }
}

impl HttpSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "ORDERFLOW_API_BIND".to_string(),
                value: addr.clone(),
                reason: e.to_string(),
            })
    }
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cache: CacheSettings,
    pub db: DbConfig,
    pub ingest: IngestSettings,
    pub http: HttpSettings,
    /// Run the bundled DDL on startup.
    pub apply_schema: bool,
}

impl AppConfig {
    /// Create AppConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `ORDERFLOW_CACHE_CAPACITY`: Cache size in orders (required, 1..=10_000_000)
    /// - `ORDERFLOW_CACHE_READ_THROUGH`: Cache store hits on a read miss (default: false)
    /// - `ORDERFLOW_DB_*`: See [`DbConfig::from_env`]
    /// - `ORDERFLOW_TOPIC`: Topic to consume (default: orders)
    /// - `ORDERFLOW_TOPIC_PARTITIONS`: Partition count of the topic (default: 3)
    /// - `ORDERFLOW_CONSUMER_OFFSET`: oldest | newest | committed (default: oldest)
    /// - `ORDERFLOW_COMMIT_INTERVAL_MS`: Auto-commit period, > 0 (default: 5000)
    /// - `ORDERFLOW_KAFKA_BROKERS`: Consume from Kafka instead of the in-process broker
    /// - `ORDERFLOW_KAFKA_GROUP_ID`: Kafka consumer group (default: orderflow)
    /// - `ORDERFLOW_API_BIND` / `ORDERFLOW_API_PORT`: Listener (default: 0.0.0.0:8080)
    /// - `ORDERFLOW_SHUTDOWN_GRACE_SECS`: HTTP drain bound (default: 5)
    /// - `ORDERFLOW_APPLY_SCHEMA`: Run DDL at startup (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let capacity = parse_capacity(lookup(ENV_CACHE_CAPACITY))?;
        let read_policy = if parse_flag(lookup(ENV_CACHE_READ_THROUGH), false) {
            ReadPolicy::ReadThrough
        } else {
            ReadPolicy::CacheAside
        };

        let start_offset = match lookup("ORDERFLOW_CONSUMER_OFFSET") {
            Some(raw) => raw.parse::<StartOffset>().map_err(|_| ConfigError::InvalidValue {
                field: "ORDERFLOW_CONSUMER_OFFSET".to_string(),
                value: raw.clone(),
                reason: "expected oldest, newest or committed".to_string(),
            })?,
            None => StartOffset::Oldest,
        };

        let ingest = IngestSettings {
            topic: lookup("ORDERFLOW_TOPIC")
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
            partitions: parse_or(lookup("ORDERFLOW_TOPIC_PARTITIONS"), DEFAULT_TOPIC_PARTITIONS),
            start_offset,
            commit_interval: parse_commit_interval(lookup(ENV_COMMIT_INTERVAL_MS))?,
            kafka_brokers: lookup(ENV_KAFKA_BROKERS).filter(|b| !b.trim().is_empty()),
            consumer_group: lookup(ENV_KAFKA_GROUP_ID)
                .filter(|g| !g.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_KAFKA_GROUP_ID.to_string()),
        };

        let http = HttpSettings {
            bind: lookup("ORDERFLOW_API_BIND").unwrap_or_else(|| DEFAULT_API_BIND.to_string()),
            port: parse_or(lookup("ORDERFLOW_API_PORT"), DEFAULT_API_PORT),
            shutdown_grace: Duration::from_secs(parse_or(
                lookup("ORDERFLOW_SHUTDOWN_GRACE_SECS"),
                DEFAULT_SHUTDOWN_GRACE_SECS,
            )),
        };

        Ok(Self {
            cache: CacheSettings {
                capacity,
                read_policy,
            },
            db: DbConfig::from_source(&lookup),
            ingest,
            http,
            apply_schema: parse_flag(lookup("ORDERFLOW_APPLY_SCHEMA"), true),
        })
    }

    /// A configuration for tests and local runs: ephemeral port, no DDL.
    pub fn development(capacity: usize) -> Self {
        Self {
            cache: CacheSettings {
                capacity,
                read_policy: ReadPolicy::CacheAside,
            },
            db: DbConfig::default(),
            ingest: IngestSettings {
                commit_interval: Duration::from_millis(100),
                ..IngestSettings::default()
            },
            http: HttpSettings {
                bind: "127.0.0.1".to_string(),
                port: 0,
                shutdown_grace: Duration::from_secs(1),
            },
            apply_schema: false,
        }
    }
}

fn parse_capacity(raw: Option<String>) -> Result<usize, ConfigError> {
    let raw = raw.ok_or_else(|| ConfigError::MissingRequired {
        field: ENV_CACHE_CAPACITY.to_string(),
    })?;
    let invalid = |reason: &str| ConfigError::InvalidValue {
        field: ENV_CACHE_CAPACITY.to_string(),
        value: raw.clone(),
        reason: reason.to_string(),
    };
    let value: i64 = raw.trim().parse().map_err(|_| invalid("not an integer"))?;
    if value <= 0 {
        return Err(invalid("must be greater than zero"));
    }
    let capacity = usize::try_from(value).map_err(|_| invalid("out of range"))?;
    if capacity > MAX_CACHE_CAPACITY {
        return Err(invalid(&format!("must not exceed {}", MAX_CACHE_CAPACITY)));
    }
    Ok(capacity)
}

fn parse_commit_interval(raw: Option<String>) -> Result<Duration, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Duration::from_millis(DEFAULT_COMMIT_INTERVAL_MS));
    };
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::InvalidValue {
            field: ENV_COMMIT_INTERVAL_MS.to_string(),
            value: raw.clone(),
            reason: "expected a positive number of milliseconds".to_string(),
        }),
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

fn parse_flag(raw: Option<String>, default: bool) -> bool {
    match raw.map(|s| s.trim().to_lowercase()) {
        Some(s) if s == "true" || s == "1" => true,
        Some(s) if s == "false" || s == "0" => false,
        _ => default,
    }
}
