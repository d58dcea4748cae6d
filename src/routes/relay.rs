//! Relay WebSocket route configuration
//!
//! # Endpoint
//!
//! `GET /ws` - WebSocket upgrade for the session/event relay
//!
//! # Protocol
//!
//! After the upgrade, clients exchange JSON envelopes with a single top-level
//! `event` key: sessionStart, promptStart, contentStart, textInput,
//! audioInput, contentEnd, promptEnd and sessionEnd inbound; the same kinds
//! plus toolUse come back from the inference stream, stamped with a
//! `timestamp` in epoch milliseconds.
//!
//! # Example
//!
//! ```json
//! // Client opens a session
//! {"event":{"sessionStart":{"inferenceConfiguration":{"maxTokens":1024,"topP":1.0,"temperature":1.0,"topK":1}}}}
//!
//! // Client streams audio
//! {"event":{"audioInput":{"promptName":"p1","contentName":"c1","content":"<base64>"}}}
//! ```

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::relay::relay_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the relay WebSocket router
pub fn create_relay_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(relay_handler))
        .layer(TraceLayer::new_for_http())
}
