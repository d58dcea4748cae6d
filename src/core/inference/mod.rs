//! Bidirectional inference channel.
//!
//! [`InferenceStream`] is the seam the session drives; [`WsInferenceStream`]
//! is the production WebSocket-backed implementation. Tests substitute an
//! in-memory implementation behind the same trait.

mod base;
mod ws;

pub use base::{HANDSHAKE_TIMEOUT, InferenceStream};
pub use ws::{WsInferenceConfig, WsInferenceStream};
