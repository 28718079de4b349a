//! Order record and its nested sub-structures.
//!
//! An [`Order`] is treated as an immutable value once it has been read or
//! decoded. Cache updates always replace the whole value, never patch it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique order key as it travels on the wire and in the store.
pub type OrderUid = String;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// A customer order as delivered on the message stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_uid: OrderUid,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
    pub locale: String,
    #[serde(default)]
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i64,
    pub date_created: Timestamp,
    pub oof_shard: String,
}

impl Order {
    /// The cache and store key of this order.
    pub fn uid(&self) -> &str {
        &self.order_uid
    }
}

/// Recipient and address information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// Payment transaction attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub transaction: String,
    #[serde(default)]
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    /// Unix seconds.
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

/// A single line item. Item order inside [`Order::items`] is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    pub sale: i64,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "order_uid": "b563feb7b2b84b6test",
        "track_number": "WBILMTESTTRACK",
        "entry": "WBIL",
        "delivery": {
            "name": "Test Testov",
            "phone": "+9720000000",
            "zip": "2639809",
            "city": "Kiryat Mozkin",
            "address": "Ploshad Mira 15",
            "region": "Kraiot",
            "email": "test@gmail.com"
        },
        "payment": {
            "transaction": "b563feb7b2b84b6test",
            "request_id": "",
            "currency": "USD",
            "provider": "wbpay",
            "amount": 1817,
            "payment_dt": 1637907727,
            "bank": "alpha",
            "delivery_cost": 1500,
            "goods_total": 317,
            "custom_fee": 0
        },
        "items": [
            {
                "chrt_id": 9934930,
                "track_number": "WBILMTESTTRACK",
                "price": 453,
                "rid": "ab4219087a764ae0btest",
                "name": "Mascaras",
                "sale": 30,
                "size": "0",
                "total_price": 317,
                "nm_id": 2389212,
                "brand": "Vivienne Sabo",
                "status": 202
            }
        ],
        "locale": "en",
        "internal_signature": "",
        "customer_id": "test",
        "delivery_service": "meest",
        "shardkey": "9",
        "sm_id": 99,
        "date_created": "2021-11-26T06:22:19Z",
        "oof_shard": "1"
    }"#;

    #[test]
    fn test_decode_wire_order() -> Result<(), serde_json::Error> {
        let order: Order = serde_json::from_str(SAMPLE)?;
        assert_eq!(order.uid(), "b563feb7b2b84b6test");
        assert_eq!(order.delivery.city, "Kiryat Mozkin");
        assert_eq!(order.payment.amount, 1817);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].total_price, 317);
        assert_eq!(order.date_created.to_rfc3339(), "2021-11-26T06:22:19+00:00");
        Ok(())
    }

    #[test]
    fn test_missing_nested_structure_is_decode_error() {
        let broken = SAMPLE.replace("\"delivery\"", "\"not_delivery\"");
        assert!(serde_json::from_str::<Order>(&broken).is_err());
    }

    #[test]
    fn test_optional_strings_default_to_empty() -> Result<(), serde_json::Error> {
        let trimmed = SAMPLE
            .replace("\"internal_signature\": \"\",", "")
            .replace("\"request_id\": \"\",", "");
        let order: Order = serde_json::from_str(&trimmed)?;
        assert!(order.internal_signature.is_empty());
        assert!(order.payment.request_id.is_empty());
        Ok(())
    }
}
