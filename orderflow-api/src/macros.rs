//! Helper macros.

/// Implement `FromRef<AppState>` for one of its fields so handlers can
/// extract just the part of the state they use.
///
/// # Example
/// ```ignore
/// impl_from_ref!(MemoryBroker, broker);
/// // Expands to:
/// impl axum::extract::FromRef<AppState> for MemoryBroker {
///     fn from_ref(state: &AppState) -> Self {
///         state.broker.clone()
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_from_ref {
    ($type:ty, $field:ident) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $type {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}
