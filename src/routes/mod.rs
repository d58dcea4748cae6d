//! Route configuration
//!
//! - `relay` - the client-facing WebSocket endpoint
//! - `GET /health` - liveness probe

mod relay;

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::state::AppState;

pub use relay::create_relay_router;

/// Liveness probe.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "s2s-relay",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Assemble the full application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(create_relay_router())
        .route("/health", get(health))
        .with_state(state)
}
