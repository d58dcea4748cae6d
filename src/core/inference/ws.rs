//! WebSocket-backed inference channel.
//!
//! Speaks the envelope protocol over a duplex WebSocket to the configured
//! inference endpoint. The connection is split once at open time; the send
//! half and receive half each live behind their own lock so the two session
//! loops never contend for the same side.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use super::base::{HANDSHAKE_TIMEOUT, InferenceStream};
use crate::core::protocol::{Envelope, decode};
use crate::errors::{ConnectError, StreamError};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Connection settings for the WebSocket inference channel.
#[derive(Debug, Clone)]
pub struct WsInferenceConfig {
    /// WebSocket endpoint, `ws://` or `wss://`
    pub endpoint: String,
    /// Model identifier appended as a query parameter
    pub model_id: String,
    /// Optional bearer token for the handshake
    pub auth_token: Option<String>,
}

/// Production [`InferenceStream`] over tokio-tungstenite.
pub struct WsInferenceStream {
    config: WsInferenceConfig,
    active: AtomicBool,
    sink: Mutex<Option<WsSink>>,
    source: Mutex<Option<WsSource>>,
}

impl WsInferenceStream {
    /// Create an unopened channel for the given configuration.
    pub fn new(config: WsInferenceConfig) -> Self {
        Self {
            config,
            active: AtomicBool::new(false),
            sink: Mutex::new(None),
            source: Mutex::new(None),
        }
    }

    /// Endpoint URL with the model query parameter.
    fn build_url(&self) -> String {
        if self.config.model_id.is_empty() {
            self.config.endpoint.clone()
        } else {
            format!("{}?model={}", self.config.endpoint, self.config.model_id)
        }
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl InferenceStream for WsInferenceStream {
    async fn open(&self) -> Result<(), ConnectError> {
        if self.is_active() {
            return Ok(());
        }

        let url = self.build_url();
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ConnectError::Endpoint(e.to_string()))?;

        if let Some(token) = &self.config.auth_token {
            let value = http::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ConnectError::Endpoint(e.to_string()))?;
            request
                .headers_mut()
                .insert(http::header::AUTHORIZATION, value);
        }

        let (stream, _response) = tokio::time::timeout(HANDSHAKE_TIMEOUT, connect_async(request))
            .await
            .map_err(|_| ConnectError::Timeout(HANDSHAKE_TIMEOUT))?
            .map_err(|e| ConnectError::Handshake(e.to_string()))?;

        info!(model_id = %self.config.model_id, "inference channel established");

        let (sink, source) = stream.split();
        *self.sink.lock().await = Some(sink);
        *self.source.lock().await = Some(source);
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, envelope: &Envelope) -> Result<(), StreamError> {
        if !self.is_active() {
            debug!(kind = envelope.event.kind(), "channel inactive, frame dropped");
            return Ok(());
        }

        let json = envelope.encode()?;
        let mut guard = self.sink.lock().await;
        match guard.as_mut() {
            Some(sink) => sink.send(Message::Text(json.into())).await.map_err(|e| {
                self.deactivate();
                StreamError::Transport(e.to_string())
            }),
            None => Ok(()),
        }
    }

    async fn receive(&self) -> Option<Result<Envelope, StreamError>> {
        let mut guard = self.source.lock().await;
        let source = guard.as_mut()?;

        loop {
            match source.next().await {
                Some(Ok(Message::Text(text))) => match decode(&text) {
                    Ok(envelope) => return Some(Ok(envelope)),
                    Err(e) => {
                        warn!(error = %e, "skipping undecodable inference frame");
                    }
                },
                Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                    Ok(text) => match decode(text) {
                        Ok(envelope) => return Some(Ok(envelope)),
                        Err(e) => {
                            warn!(error = %e, "skipping undecodable inference frame");
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "skipping non-UTF-8 inference frame");
                    }
                },
                Some(Ok(Message::Ping(payload))) => {
                    if let Some(sink) = self.sink.lock().await.as_mut() {
                        let _ = sink.send(Message::Pong(payload)).await;
                    }
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    self.deactivate();
                    // A non-normal close with a cause is a backend rejection,
                    // not an orderly end of stream
                    if let Some(frame) = frame
                        && frame.code != CloseCode::Normal
                        && !frame.reason.is_empty()
                    {
                        return Some(Err(StreamError::Rejected(frame.reason.to_string())));
                    }
                    info!("inference channel closed by backend");
                    return None;
                }
                Some(Err(e)) => {
                    self.deactivate();
                    return Some(Err(StreamError::Transport(e.to_string())));
                }
                None => {
                    self.deactivate();
                    return None;
                }
            }
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        self.deactivate();
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.send(Message::Close(None)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> WsInferenceConfig {
        WsInferenceConfig {
            endpoint: "ws://127.0.0.1:9".to_string(),
            model_id: "relay-test-v1".to_string(),
            auth_token: None,
        }
    }

    #[test]
    fn test_build_url_appends_model() {
        let stream = WsInferenceStream::new(test_config());
        assert_eq!(stream.build_url(), "ws://127.0.0.1:9?model=relay-test-v1");
    }

    #[test]
    fn test_build_url_without_model() {
        let mut config = test_config();
        config.model_id = String::new();
        let stream = WsInferenceStream::new(config);
        assert_eq!(stream.build_url(), "ws://127.0.0.1:9");
    }

    #[tokio::test]
    async fn test_send_is_noop_when_inactive() {
        let stream = WsInferenceStream::new(test_config());
        assert!(!stream.is_active());

        let result = stream.send(&Envelope::session_end()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_receive_on_unopened_channel_is_end_of_stream() {
        let stream = WsInferenceStream::new(test_config());
        assert!(stream.receive().await.is_none());
    }

    #[tokio::test]
    async fn test_open_unreachable_endpoint_fails() {
        let stream = WsInferenceStream::new(test_config());
        match stream.open().await {
            Err(ConnectError::Handshake(_)) => {}
            other => panic!("expected Handshake error, got {other:?}"),
        }
    }
}
