//! Base trait for bidirectional inference channels.

use std::time::Duration;

use async_trait::async_trait;

use crate::core::protocol::Envelope;
use crate::errors::{ConnectError, StreamError};

/// Upper bound on the channel handshake. Opening slower than this fails the
/// session.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// A bidirectional streaming inference channel.
///
/// One instance serves one session. Two session loops run against the same
/// instance concurrently — one draining queued audio into [`send`], one
/// pulling frames out of [`receive`] — so every method takes `&self` and
/// implementations keep their halves behind interior mutability.
///
/// [`send`]: InferenceStream::send
/// [`receive`]: InferenceStream::receive
#[async_trait]
pub trait InferenceStream: Send + Sync {
    /// Establish the channel. Must fail with [`ConnectError::Timeout`] if the
    /// handshake exceeds [`HANDSHAKE_TIMEOUT`]; the caller aborts the session
    /// on any open failure.
    async fn open(&self) -> Result<(), ConnectError>;

    /// Serialize and transmit one frame. A no-op when the channel is
    /// inactive.
    async fn send(&self, envelope: &Envelope) -> Result<(), StreamError>;

    /// Produce the next decoded frame.
    ///
    /// - `Some(Ok(_))` — the next well-formed frame; undecodable frames are
    ///   logged and skipped internally, never surfaced.
    /// - `None` — orderly end of stream.
    /// - `Some(Err(_))` — unrecoverable stream failure; the channel
    ///   deactivates itself before returning this.
    async fn receive(&self) -> Option<Result<Envelope, StreamError>>;

    /// Whether the channel is currently able to carry frames.
    fn is_active(&self) -> bool;

    /// Deactivate the channel and release the underlying transport.
    /// Safe to call more than once.
    async fn shutdown(&self);
}
