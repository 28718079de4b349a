//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres, and the durable
//! [`OrderRepository`] built on it. An order is spread over four tables
//! (`orders`, `delivery`, `payment`, `items`) and is written in a single
//! transaction so a partially stored order is never visible.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolError, RecyclingMethod, Runtime};
use orderflow_core::{
    Delivery, Item, Order, OrderflowResult, Payment, StorageError, Timestamp,
};
use orderflow_storage::OrderRepository;
use tokio_postgres::error::SqlState;
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info, warn};

use crate::constants::*;
use crate::error::{ApiError, ApiResult};

/// Idempotent DDL bundled with the crate.
pub const SCHEMA_SQL: &str = include_str!("../sql/schema.sql");

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait, create and recycle timeout for pooled connections
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            dbname: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: String::new(),
            max_size: DEFAULT_DB_POOL_SIZE,
            timeout: Duration::from_secs(DEFAULT_DB_TIMEOUT_SECS),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from `ORDERFLOW_DB_*` variables.
    pub fn from_env() -> Self {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset or unparsable values fall
    /// back to their defaults.
    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            host: lookup("ORDERFLOW_DB_HOST").unwrap_or(defaults.host),
            port: lookup("ORDERFLOW_DB_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: lookup("ORDERFLOW_DB_NAME").unwrap_or(defaults.dbname),
            user: lookup("ORDERFLOW_DB_USER").unwrap_or(defaults.user),
            password: lookup("ORDERFLOW_DB_PASSWORD").unwrap_or_default(),
            max_size: lookup("ORDERFLOW_DB_POOL_SIZE")
                .and_then(|s| s.parse().ok())
                .filter(|size| *size > 0)
                .unwrap_or(defaults.max_size),
            timeout: lookup("ORDERFLOW_DB_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Create a connection pool from this configuration.
    ///
    /// No connection is opened here; see [`PgOrderRepository::ping`].
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_config = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_config.timeouts.wait = Some(self.timeout);
        pool_config.timeouts.create = Some(self.timeout);
        pool_config.timeouts.recycle = Some(self.timeout);
        cfg.pool = Some(pool_config);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// SQL
// ============================================================================

const INSERT_ORDER: &str = "INSERT INTO orders (order_uid, track_number, entry, locale, \
     internal_signature, customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)";

const INSERT_DELIVERY: &str = "INSERT INTO delivery (order_uid, name, phone, zip, city, \
     address, region, email) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

const INSERT_PAYMENT: &str = "INSERT INTO payment (order_uid, transaction, request_id, \
     currency, provider, amount, payment_dt, bank, delivery_cost, goods_total, custom_fee) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)";

const INSERT_ITEM: &str = "INSERT INTO items (order_uid, chrt_id, track_number, price, rid, \
     name, sale, size, total_price, nm_id, brand, status) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)";

/// Joined order/delivery/payment projection; `{source}` is either the
/// `orders` table or a limited subquery over it.
macro_rules! select_orders {
    ($source:literal, $tail:literal) => {
        concat!(
            "SELECT o.order_uid, o.track_number, o.entry, o.locale, o.internal_signature, ",
            "o.customer_id, o.delivery_service, o.shardkey, o.sm_id, o.date_created, o.oof_shard, ",
            "d.name AS d_name, d.phone AS d_phone, d.zip AS d_zip, d.city AS d_city, ",
            "d.address AS d_address, d.region AS d_region, d.email AS d_email, ",
            "p.transaction AS p_transaction, p.request_id AS p_request_id, ",
            "p.currency AS p_currency, p.provider AS p_provider, p.amount AS p_amount, ",
            "p.payment_dt AS p_payment_dt, p.bank AS p_bank, p.delivery_cost AS p_delivery_cost, ",
            "p.goods_total AS p_goods_total, p.custom_fee AS p_custom_fee ",
            "FROM ",
            $source,
            " o JOIN delivery d ON d.order_uid = o.order_uid ",
            "JOIN payment p ON p.order_uid = o.order_uid ",
            $tail
        )
    };
}

const SELECT_RECENT_ORDERS: &str = select_orders!(
    "(SELECT * FROM orders ORDER BY date_created DESC, order_uid DESC LIMIT $1)",
    "ORDER BY o.date_created DESC, o.order_uid DESC"
);

const SELECT_ORDER: &str = select_orders!("orders", "WHERE o.order_uid = $1");

const SELECT_ITEMS: &str = "SELECT order_uid, chrt_id, track_number, price, rid, name, sale, \
     size, total_price, nm_id, brand, status FROM items WHERE order_uid = ANY($1) ORDER BY id";

// ============================================================================
// REPOSITORY
// ============================================================================

/// PostgreSQL-backed [`OrderRepository`].
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: Pool,
}

impl PgOrderRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a repository from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Open a connection and run a trivial query.
    pub async fn ping(&self) -> ApiResult<()> {
        let client = self.pool.get().await?;
        client.execute("SELECT 1", &[]).await?;
        Ok(())
    }

    /// Run the bundled DDL. Safe to call on every start.
    pub async fn apply_schema(&self) -> ApiResult<()> {
        let client = self.pool.get().await?;
        client.batch_execute(SCHEMA_SQL).await?;
        info!("Database schema applied");
        Ok(())
    }

    /// Close the pool. Checked-out connections are dropped when returned.
    pub fn close(&self) {
        self.pool.close();
        info!("Database pool closed");
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, StorageError> {
        self.pool.get().await.map_err(pool_error)
    }

    /// Load items for `uids` and attach them, preserving insertion order.
    async fn attach_items(
        &self,
        client: &deadpool_postgres::Object,
        orders: &mut [Order],
    ) -> Result<(), StorageError> {
        if orders.is_empty() {
            return Ok(());
        }
        let uids: Vec<String> = orders.iter().map(|o| o.order_uid.clone()).collect();
        let rows = client
            .query(SELECT_ITEMS, &[&uids])
            .await
            .map_err(query_error)?;

        let mut by_order: HashMap<String, Vec<Item>> = HashMap::new();
        for row in &rows {
            let (order_uid, item) = item_from_row(row)?;
            by_order.entry(order_uid).or_default().push(item);
        }
        for order in orders.iter_mut() {
            order.items = by_order.remove(&order.order_uid).unwrap_or_default();
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn add_order(&self, order: &Order) -> OrderflowResult<()> {
        let uid = order.order_uid.as_str();
        let insert_failed = |e: tokio_postgres::Error| insert_error(uid, e);

        let mut client = self.client().await?;
        let tx = client.transaction().await.map_err(|e| {
            StorageError::TransactionFailed {
                reason: e.to_string(),
            }
        })?;

        tx.execute(
            INSERT_ORDER,
            &[
                &order.order_uid,
                &order.track_number,
                &order.entry,
                &order.locale,
                &order.internal_signature,
                &order.customer_id,
                &order.delivery_service,
                &order.shardkey,
                &order.sm_id,
                &order.date_created,
                &order.oof_shard,
            ],
        )
        .await
        .map_err(insert_failed)?;

        let d = &order.delivery;
        tx.execute(
            INSERT_DELIVERY,
            &[
                &order.order_uid,
                &d.name,
                &d.phone,
                &d.zip,
                &d.city,
                &d.address,
                &d.region,
                &d.email,
            ],
        )
        .await
        .map_err(insert_failed)?;

        let p = &order.payment;
        tx.execute(
            INSERT_PAYMENT,
            &[
                &order.order_uid,
                &p.transaction,
                &p.request_id,
                &p.currency,
                &p.provider,
                &p.amount,
                &p.payment_dt,
                &p.bank,
                &p.delivery_cost,
                &p.goods_total,
                &p.custom_fee,
            ],
        )
        .await
        .map_err(insert_failed)?;

        for item in &order.items {
            tx.execute(
                INSERT_ITEM,
                &[
                    &order.order_uid,
                    &item.chrt_id,
                    &item.track_number,
                    &item.price,
                    &item.rid,
                    &item.name,
                    &item.sale,
                    &item.size,
                    &item.total_price,
                    &item.nm_id,
                    &item.brand,
                    &item.status,
                ],
            )
            .await
            .map_err(insert_failed)?;
        }

        // Dropping an uncommitted transaction rolls it back.
        tx.commit()
            .await
            .map_err(|e| StorageError::TransactionFailed {
                reason: e.to_string(),
            })?;

        debug!(order_uid = uid, items = order.items.len(), "Order stored");
        Ok(())
    }

    async fn get_orders(&self, limit: usize) -> OrderflowResult<Vec<Order>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let client = self.client().await?;
        let rows = client
            .query(SELECT_RECENT_ORDERS, &[&limit])
            .await
            .map_err(query_error)?;

        let mut orders = rows
            .iter()
            .map(order_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        self.attach_items(&client, &mut orders).await?;
        Ok(orders)
    }

    async fn get_order(&self, order_uid: &str) -> OrderflowResult<Option<Order>> {
        let client = self.client().await?;
        let row = client
            .query_opt(SELECT_ORDER, &[&order_uid])
            .await
            .map_err(query_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut orders = [order_from_row(&row)?];
        self.attach_items(&client, &mut orders).await?;
        let [order] = orders;
        Ok(Some(order))
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn order_from_row(row: &Row) -> Result<Order, StorageError> {
    let order_uid: String = row.try_get("order_uid").map_err(query_error)?;
    let corrupt = |e: tokio_postgres::Error| StorageError::CorruptRow {
        order_uid: order_uid.clone(),
        reason: e.to_string(),
    };

    let date_created: Timestamp = row.try_get("date_created").map_err(corrupt)?;
    let delivery = Delivery {
        name: row.try_get("d_name").map_err(corrupt)?,
        phone: row.try_get("d_phone").map_err(corrupt)?,
        zip: row.try_get("d_zip").map_err(corrupt)?,
        city: row.try_get("d_city").map_err(corrupt)?,
        address: row.try_get("d_address").map_err(corrupt)?,
        region: row.try_get("d_region").map_err(corrupt)?,
        email: row.try_get("d_email").map_err(corrupt)?,
    };
    let payment = Payment {
        transaction: row.try_get("p_transaction").map_err(corrupt)?,
        request_id: row.try_get("p_request_id").map_err(corrupt)?,
        currency: row.try_get("p_currency").map_err(corrupt)?,
        provider: row.try_get("p_provider").map_err(corrupt)?,
        amount: row.try_get("p_amount").map_err(corrupt)?,
        payment_dt: row.try_get("p_payment_dt").map_err(corrupt)?,
        bank: row.try_get("p_bank").map_err(corrupt)?,
        delivery_cost: row.try_get("p_delivery_cost").map_err(corrupt)?,
        goods_total: row.try_get("p_goods_total").map_err(corrupt)?,
        custom_fee: row.try_get("p_custom_fee").map_err(corrupt)?,
    };

    Ok(Order {
        track_number: row.try_get("track_number").map_err(corrupt)?,
        entry: row.try_get("entry").map_err(corrupt)?,
        delivery,
        payment,
        items: Vec::new(),
        locale: row.try_get("locale").map_err(corrupt)?,
        internal_signature: row.try_get("internal_signature").map_err(corrupt)?,
        customer_id: row.try_get("customer_id").map_err(corrupt)?,
        delivery_service: row.try_get("delivery_service").map_err(corrupt)?,
        shardkey: row.try_get("shardkey").map_err(corrupt)?,
        sm_id: row.try_get("sm_id").map_err(corrupt)?,
        date_created,
        oof_shard: row.try_get("oof_shard").map_err(corrupt)?,
        order_uid,
    })
}

fn item_from_row(row: &Row) -> Result<(String, Item), StorageError> {
    let order_uid: String = row.try_get("order_uid").map_err(query_error)?;
    let corrupt = |e: tokio_postgres::Error| StorageError::CorruptRow {
        order_uid: order_uid.clone(),
        reason: e.to_string(),
    };

    let item = Item {
        chrt_id: row.try_get("chrt_id").map_err(corrupt)?,
        track_number: row.try_get("track_number").map_err(corrupt)?,
        price: row.try_get("price").map_err(corrupt)?,
        rid: row.try_get("rid").map_err(corrupt)?,
        name: row.try_get("name").map_err(corrupt)?,
        sale: row.try_get("sale").map_err(corrupt)?,
        size: row.try_get("size").map_err(corrupt)?,
        total_price: row.try_get("total_price").map_err(corrupt)?,
        nm_id: row.try_get("nm_id").map_err(corrupt)?,
        brand: row.try_get("brand").map_err(corrupt)?,
        status: row.try_get("status").map_err(corrupt)?,
    };
    Ok((order_uid, item))
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn pool_error(err: PoolError) -> StorageError {
    warn!(error = ?err, "Failed to acquire database connection");
    StorageError::Unavailable {
        reason: err.to_string(),
    }
}

fn query_error(err: tokio_postgres::Error) -> StorageError {
    StorageError::QueryFailed {
        reason: err.to_string(),
    }
}

fn insert_error(order_uid: &str, err: tokio_postgres::Error) -> StorageError {
    let reason = if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        "order_uid already stored".to_string()
    } else {
        err.to_string()
    };
    StorageError::InsertFailed {
        order_uid: order_uid.to_string(),
        reason,
    }
}
