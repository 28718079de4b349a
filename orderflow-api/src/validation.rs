//! Request validation for path parameters.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::ORDER_UID_PATTERN;
use crate::error::{ApiError, ApiResult};

static ORDER_UID_RE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(ORDER_UID_PATTERN));

/// Trait for validating order keys taken from a request.
///
/// # Example
/// ```ignore
/// use orderflow_api::validation::ValidateOrderUid;
///
/// async fn lookup(uid: String) -> ApiResult<()> {
///     uid.validate_order_uid()?;
///     // ... read path
/// }
/// ```
pub trait ValidateOrderUid {
    /// # Errors
    /// Returns `ApiError::invalid_format` if the value does not match
    /// [`ORDER_UID_PATTERN`].
    fn validate_order_uid(&self) -> ApiResult<()>;
}

impl ValidateOrderUid for str {
    fn validate_order_uid(&self) -> ApiResult<()> {
        let re = ORDER_UID_RE
            .as_ref()
            .map_err(|e| ApiError::internal_error(format!("Invalid order uid pattern: {}", e)))?;
        if re.is_match(self) {
            Ok(())
        } else {
            Err(ApiError::invalid_format("order_uid", ORDER_UID_PATTERN))
        }
    }
}

impl ValidateOrderUid for String {
    fn validate_order_uid(&self) -> ApiResult<()> {
        self.as_str().validate_order_uid()
    }
}
