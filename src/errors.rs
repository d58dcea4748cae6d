//! Error taxonomy for the relay core.
//!
//! Each error family maps to one failure domain and one recovery rule:
//!
//! - [`DecodeError`] — malformed or unrecognized frame; logged, frame skipped,
//!   session continues.
//! - [`ConnectError`] — inference channel handshake failure; fatal to the
//!   session, the connection is aborted.
//! - [`StreamError`] — mid-stream backend failure; deactivates the session,
//!   stops all loops, no automatic retry.
//! - [`ResolverError`] — tool-query failure; recovered inline as an error
//!   string, session continues.
//! - [`TransportError`] — client disconnect; triggers teardown, no retry.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while decoding an inbound wire frame.
///
/// Always recoverable: the frame is logged and skipped, the session stays up.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not valid JSON
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Payload parsed but carries no `event` object
    #[error("frame has no event object")]
    MissingEvent,

    /// The `event` object is tagged with a kind this protocol does not define
    #[error("unrecognized event kind: {0}")]
    UnknownKind(String),

    /// The kind is known but its fields do not match the schema
    #[error("invalid {kind} event: {source}")]
    InvalidFields {
        /// Event kind that failed to deserialize
        kind: String,
        /// Underlying serde error
        source: serde_json::Error,
    },
}

/// Errors raised while opening the bidirectional inference channel.
///
/// Fatal to the session: the caller aborts the connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Handshake did not complete within the allowed window
    #[error("inference channel handshake timed out after {0:?}")]
    Timeout(Duration),

    /// Handshake was rejected or the endpoint is unreachable
    #[error("inference channel handshake failed: {0}")]
    Handshake(String),

    /// The configured endpoint could not be turned into a request
    #[error("invalid inference endpoint: {0}")]
    Endpoint(String),
}

/// Errors raised on an established inference stream.
///
/// Fatal: the adapter deactivates and all session loops stop. No retry.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The underlying transport failed mid-stream
    #[error("inference stream transport failure: {0}")]
    Transport(String),

    /// The backend rejected the stream (validation failure or close-with-cause)
    #[error("inference stream rejected by backend: {0}")]
    Rejected(String),

    /// An outbound frame could not be serialized
    #[error("failed to serialize outbound frame: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised by the external Query Resolver.
///
/// Never propagated past the dispatch bridge: converted into a user-facing
/// error string and sent as a regular tool result.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The resolver could not be reached or returned a failure status
    #[error("query resolver request failed: {0}")]
    Request(String),

    /// The resolver answered with a body this relay cannot use
    #[error("query resolver returned an unusable response: {0}")]
    Response(String),
}

/// Errors raised on the client-facing transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The client closed the connection
    #[error("client transport closed")]
    Closed,

    /// A frame could not be delivered to the client
    #[error("failed to send frame to client: {0}")]
    Send(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::UnknownKind("fooBar".to_string());
        assert_eq!(err.to_string(), "unrecognized event kind: fooBar");

        let err = DecodeError::MissingEvent;
        assert!(err.to_string().contains("no event object"));
    }

    #[test]
    fn test_connect_error_display() {
        let err = ConnectError::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_resolver_error_display() {
        let err = ResolverError::Request("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }
}
