//! WebSocket request handlers
//!
//! - `relay` - client-facing duplex endpoint bridging to the inference stream

pub mod relay;

// Re-export commonly used handlers for convenient access
pub use relay::relay_handler;
