//! orderflow Test Utilities
//!
//! Centralized test infrastructure for the workspace:
//! - Fixtures for well-formed orders
//! - Proptest generators for order records and key sequences
//! - Wire payload helpers for ingestion tests

pub use orderflow_core::{
    Delivery, Item, Order, OrderflowError, OrderflowResult, Payment, StorageError, Validate,
    ValidationError,
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

// ============================================================================
// FIXTURES
// ============================================================================

/// Fixed base instant so generated `date_created` values are reproducible.
pub fn base_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_637_907_727, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// A well-formed order with the given uid.
pub fn sample_order(order_uid: &str) -> Order {
    sample_order_at(order_uid, base_time())
}

/// A well-formed order created at `date_created`.
pub fn sample_order_at(order_uid: &str, date_created: DateTime<Utc>) -> Order {
    Order {
        order_uid: order_uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: order_uid.to_string(),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1_637_907_727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: vec![Item {
            chrt_id: 9_934_930,
            track_number: "WBILMTESTTRACK".to_string(),
            price: 453,
            rid: "ab4219087a764ae0btest".to_string(),
            name: "Mascaras".to_string(),
            sale: 30,
            size: "0".to_string(),
            total_price: 317,
            nm_id: 2_389_212,
            brand: "Vivienne Sabo".to_string(),
            status: 202,
        }],
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created,
        oof_shard: "1".to_string(),
    }
}

/// `count` orders named `{prefix}-0000..`, each one minute newer than the last.
pub fn sequential_orders(prefix: &str, count: usize) -> Vec<Order> {
    (0..count)
        .map(|i| {
            sample_order_at(
                &format!("{}-{:04}", prefix, i),
                base_time() + Duration::minutes(i as i64),
            )
        })
        .collect()
}

/// A uid accepted by the lookup route's format check.
pub fn random_order_uid() -> String {
    uuid::Uuid::now_v7().simple().to_string()
}

/// JSON payload for an order, as a producer would publish it.
pub fn order_payload(order: &Order) -> Vec<u8> {
    serde_json::to_vec(order).unwrap_or_default()
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

/// Generate valid order uids.
pub fn arb_order_uid() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{8,32}"
}

/// Generate a line item that passes validation.
pub fn arb_item() -> impl Strategy<Value = Item> {
    (
        1i64..10_000_000,
        0i64..100_000,
        0i64..100,
        "[a-z0-9]{8,20}",
        "[A-Za-z ]{1,16}",
    )
        .prop_map(|(chrt_id, price, sale, rid, name)| Item {
            chrt_id,
            track_number: "WBILMTESTTRACK".to_string(),
            price,
            rid,
            name: if name.trim().is_empty() {
                "item".to_string()
            } else {
                name
            },
            sale,
            size: "0".to_string(),
            total_price: price * (100 - sale) / 100,
            nm_id: chrt_id / 3,
            brand: "Brand".to_string(),
            status: 202,
        })
}

/// Generate a complete order that passes validation.
pub fn arb_order() -> impl Strategy<Value = Order> {
    (
        arb_order_uid(),
        prop::collection::vec(arb_item(), 1..5),
        0i64..1_000_000,
    )
        .prop_map(|(uid, items, offset_secs)| {
            let mut order = sample_order_at(&uid, base_time() + Duration::seconds(offset_secs));
            order.payment.goods_total = items.iter().map(|i| i.total_price).sum();
            order.items = items;
            order
        })
}

/// Generate a sequence of cache operations over a small key space.
///
/// `true` is a put, `false` a get. Small key spaces force hits, updates
/// and evictions in the same run.
pub fn arb_cache_ops(max_len: usize) -> impl Strategy<Value = Vec<(bool, u8)>> {
    prop::collection::vec((any::<bool>(), 0u8..12), 0..max_len)
}
