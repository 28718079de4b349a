//! Structural validation applied to inbound records before persistence.
//!
//! Checks field presence and basic value ranges only. Anything that needs
//! the store (uniqueness, for example) is enforced by the store itself.

use crate::error::ValidationError;
use crate::order::{Delivery, Item, Order, Payment};

/// Structural contract check.
pub trait Validate {
    /// Returns the first violation found, in field declaration order.
    fn validate(&self) -> Result<(), ValidationError>;
}

fn required(value: &str, field: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn non_negative(value: i64, field: &str) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("must be non-negative, got {}", value),
        });
    }
    Ok(())
}

impl Validate for Order {
    fn validate(&self) -> Result<(), ValidationError> {
        required(&self.order_uid, "order_uid")?;
        required(&self.track_number, "track_number")?;
        required(&self.entry, "entry")?;
        self.delivery.validate()?;
        self.payment.validate()?;

        if self.items.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "items".to_string(),
            });
        }
        for (idx, item) in self.items.iter().enumerate() {
            item.validate().map_err(|e| prefix(e, &format!("items[{}]", idx)))?;
        }

        required(&self.locale, "locale")?;
        required(&self.customer_id, "customer_id")?;
        required(&self.delivery_service, "delivery_service")?;
        required(&self.shardkey, "shardkey")?;
        non_negative(self.sm_id, "sm_id")?;
        required(&self.oof_shard, "oof_shard")?;
        Ok(())
    }
}

impl Validate for Delivery {
    fn validate(&self) -> Result<(), ValidationError> {
        required(&self.name, "delivery.name")?;
        required(&self.phone, "delivery.phone")?;
        required(&self.city, "delivery.city")?;
        required(&self.address, "delivery.address")?;
        required(&self.region, "delivery.region")?;
        required(&self.email, "delivery.email")?;
        if !self.email.contains('@') {
            return Err(ValidationError::InvalidValue {
                field: "delivery.email".to_string(),
                reason: "must be an email address".to_string(),
            });
        }
        Ok(())
    }
}

impl Validate for Payment {
    fn validate(&self) -> Result<(), ValidationError> {
        required(&self.transaction, "payment.transaction")?;
        required(&self.currency, "payment.currency")?;
        required(&self.provider, "payment.provider")?;
        non_negative(self.amount, "payment.amount")?;
        non_negative(self.payment_dt, "payment.payment_dt")?;
        non_negative(self.delivery_cost, "payment.delivery_cost")?;
        non_negative(self.goods_total, "payment.goods_total")?;
        non_negative(self.custom_fee, "payment.custom_fee")?;
        Ok(())
    }
}

impl Validate for Item {
    fn validate(&self) -> Result<(), ValidationError> {
        required(&self.track_number, "track_number")?;
        required(&self.rid, "rid")?;
        required(&self.name, "name")?;
        required(&self.brand, "brand")?;
        non_negative(self.price, "price")?;
        non_negative(self.sale, "sale")?;
        non_negative(self.total_price, "total_price")?;
        Ok(())
    }
}

fn prefix(err: ValidationError, path: &str) -> ValidationError {
    match err {
        ValidationError::RequiredFieldMissing { field } => ValidationError::RequiredFieldMissing {
            field: format!("{}.{}", path, field),
        },
        ValidationError::InvalidValue { field, reason } => ValidationError::InvalidValue {
            field: format!("{}.{}", path, field),
            reason,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn valid_order() -> Order {
        Order {
            order_uid: "b563feb7b2b84b6test".to_string(),
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
                transaction: "b563feb7b2b84b6test".to_string(),
                request_id: String::new(),
                currency: "USD".to_string(),
                provider: "wbpay".to_string(),
                amount: 1817,
                payment_dt: 1637907727,
                bank: "alpha".to_string(),
                delivery_cost: 1500,
                goods_total: 317,
                custom_fee: 0,
            },
            items: vec![Item {
                chrt_id: 9934930,
                track_number: "WBILMTESTTRACK".to_string(),
                price: 453,
                rid: "ab4219087a764ae0btest".to_string(),
                name: "Mascaras".to_string(),
                sale: 30,
                size: "0".to_string(),
                total_price: 317,
                nm_id: 2389212,
                brand: "Vivienne Sabo".to_string(),
                status: 202,
            }],
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap(),
            oof_shard: "1".to_string(),
        }
    }

    #[test]
    fn test_valid_order_passes() {
        assert_eq!(valid_order().validate(), Ok(()));
    }

    #[test]
    fn test_blank_uid_rejected() {
        let mut order = valid_order();
        order.order_uid = "   ".to_string();
        let err = order.validate().unwrap_err();
        assert_eq!(err.field(), "order_uid");
    }

    #[test]
    fn test_nested_delivery_field_reported_with_path() {
        let mut order = valid_order();
        order.delivery.email = "not-an-email".to_string();
        let err = order.validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
        assert_eq!(err.field(), "delivery.email");
    }

    #[test]
    fn test_empty_items_rejected() {
        let mut order = valid_order();
        order.items.clear();
        assert_eq!(order.validate().unwrap_err().field(), "items");
    }

    #[test]
    fn test_item_error_carries_index() {
        let mut order = valid_order();
        let mut second = order.items[0].clone();
        second.rid = String::new();
        order.items.push(second);
        assert_eq!(order.validate().unwrap_err().field(), "items[1].rid");
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut order = valid_order();
        order.payment.amount = -1;
        assert_eq!(order.validate().unwrap_err().field(), "payment.amount");
    }
}
