//! Error types for orderflow operations

use thiserror::Error;

/// Durable store and cache layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Insert failed for order {order_uid}: {reason}")]
    InsertFailed { order_uid: String, reason: String },

    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Corrupt row for order {order_uid}: {reason}")]
    CorruptRow { order_uid: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Structural validation errors for inbound records.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ValidationError {
    /// The dotted path of the offending field.
    pub fn field(&self) -> &str {
        match self {
            Self::RequiredFieldMissing { field } | Self::InvalidValue { field, .. } => field,
        }
    }
}

/// Configuration errors. Any of these is fatal at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all orderflow errors.
#[derive(Debug, Clone, Error)]
pub enum OrderflowError {
    /// First-class lookup outcome, distinct from internal failures.
    #[error("Order not found: {order_uid}")]
    NotFound { order_uid: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl OrderflowError {
    pub fn not_found(order_uid: impl Into<String>) -> Self {
        Self::NotFound {
            order_uid: order_uid.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for orderflow operations.
pub type OrderflowResult<T> = Result<T, OrderflowError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_insert_failed() {
        let err = StorageError::InsertFailed {
            order_uid: "b563feb7b2b84b6test".to_string(),
            reason: "duplicate key".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Insert failed"));
        assert!(msg.contains("b563feb7b2b84b6test"));
        assert!(msg.contains("duplicate key"));
    }

    #[test]
    fn test_validation_error_field() {
        let err = ValidationError::RequiredFieldMissing {
            field: "delivery.email".to_string(),
        };
        assert_eq!(err.field(), "delivery.email");

        let err = ValidationError::InvalidValue {
            field: "payment.amount".to_string(),
            reason: "must be non-negative".to_string(),
        };
        assert_eq!(err.field(), "payment.amount");
        assert!(format!("{}", err).contains("must be non-negative"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "ORDERFLOW_CACHE_CAPACITY".to_string(),
            value: "0".to_string(),
            reason: "must be greater than zero".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("ORDERFLOW_CACHE_CAPACITY"));
        assert!(msg.contains("must be greater than zero"));
    }

    #[test]
    fn test_orderflow_error_from_variants() {
        let storage = OrderflowError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, OrderflowError::Storage(_)));
        assert!(!storage.is_not_found());

        let validation = OrderflowError::from(ValidationError::RequiredFieldMissing {
            field: "order_uid".to_string(),
        });
        assert!(matches!(validation, OrderflowError::Validation(_)));

        let config = OrderflowError::from(ConfigError::MissingRequired {
            field: "ORDERFLOW_CACHE_CAPACITY".to_string(),
        });
        assert!(matches!(config, OrderflowError::Config(_)));

        assert!(OrderflowError::not_found("abc").is_not_found());
    }
}
