//! Liveness banner.

use axum::{routing::get, Router};

use crate::constants::INDEX_BANNER;
use crate::state::AppState;

pub async fn index() -> &'static str {
    INDEX_BANNER
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/", get(index))
}
