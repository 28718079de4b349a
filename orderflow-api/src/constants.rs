//! Default values for environment-driven configuration.

// ============================================================================
// CACHE
// ============================================================================

pub const ENV_CACHE_CAPACITY: &str = "ORDERFLOW_CACHE_CAPACITY";
pub const ENV_CACHE_READ_THROUGH: &str = "ORDERFLOW_CACHE_READ_THROUGH";

// ============================================================================
// STREAM
// ============================================================================

pub const DEFAULT_TOPIC: &str = "orders";
pub const DEFAULT_TOPIC_PARTITIONS: i32 = 3;
pub const DEFAULT_COMMIT_INTERVAL_MS: u64 = 5_000;
pub const ENV_COMMIT_INTERVAL_MS: &str = "ORDERFLOW_COMMIT_INTERVAL_MS";

/// Comma-separated Kafka bootstrap servers. Unset means the in-process broker.
pub const ENV_KAFKA_BROKERS: &str = "ORDERFLOW_KAFKA_BROKERS";
pub const ENV_KAFKA_GROUP_ID: &str = "ORDERFLOW_KAFKA_GROUP_ID";
pub const DEFAULT_KAFKA_GROUP_ID: &str = "orderflow";

// ============================================================================
// HTTP
// ============================================================================

pub const DEFAULT_API_BIND: &str = "0.0.0.0";
pub const DEFAULT_API_PORT: u16 = 8080;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Body of `GET /`.
pub const INDEX_BANNER: &str = "Service orderflow: Order is online";

/// Accepted shape of an order uid in lookup paths.
pub const ORDER_UID_PATTERN: &str = r"^[a-zA-Z0-9_-]{8,64}$";

/// Upper bound on a payload accepted by the publish route.
pub const MAX_PUBLISH_BYTES: usize = 1024 * 1024;

// ============================================================================
// DATABASE
// ============================================================================

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_NAME: &str = "orderflow";
pub const DEFAULT_DB_USER: &str = "postgres";
pub const DEFAULT_DB_POOL_SIZE: usize = 16;
pub const DEFAULT_DB_TIMEOUT_SECS: u64 = 30;
