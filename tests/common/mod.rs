//! Shared test doubles for relay tests.
//!
//! `MockInferenceStream` stands in for the backend channel: the test feeds
//! frames through the handle and observes everything the session sends, in
//! order. The resolvers script the external query collaborator.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use s2s_relay::core::protocol::Envelope;
use s2s_relay::core::{InferenceStream, QueryResolver};
use s2s_relay::errors::{ConnectError, ResolverError, StreamError};

/// Test-side handle to a [`MockInferenceStream`].
pub struct MockStreamHandle {
    /// Frames (or a fatal error) the session will receive
    pub incoming: mpsc::UnboundedSender<Result<Envelope, StreamError>>,
    /// Frames the session sent, in order
    pub sent: mpsc::UnboundedReceiver<Envelope>,
}

/// In-memory bidirectional channel implementing [`InferenceStream`].
pub struct MockInferenceStream {
    active: AtomicBool,
    fail_open: bool,
    incoming_rx: Mutex<mpsc::UnboundedReceiver<Result<Envelope, StreamError>>>,
    sent_tx: mpsc::UnboundedSender<Envelope>,
}

impl MockInferenceStream {
    pub fn new() -> (Arc<Self>, MockStreamHandle) {
        Self::build(false)
    }

    /// A channel whose handshake always fails.
    pub fn refusing() -> (Arc<Self>, MockStreamHandle) {
        Self::build(true)
    }

    fn build(fail_open: bool) -> (Arc<Self>, MockStreamHandle) {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let stream = Arc::new(Self {
            active: AtomicBool::new(false),
            fail_open,
            incoming_rx: Mutex::new(incoming_rx),
            sent_tx,
        });
        let handle = MockStreamHandle {
            incoming: incoming_tx,
            sent: sent_rx,
        };
        (stream, handle)
    }
}

#[async_trait]
impl InferenceStream for MockInferenceStream {
    async fn open(&self) -> Result<(), ConnectError> {
        if self.fail_open {
            return Err(ConnectError::Handshake("mock backend refused".to_string()));
        }
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, envelope: &Envelope) -> Result<(), StreamError> {
        if !self.is_active() {
            return Ok(());
        }
        let _ = self.sent_tx.send(envelope.clone());
        Ok(())
    }

    async fn receive(&self) -> Option<Result<Envelope, StreamError>> {
        let item = self.incoming_rx.lock().await.recv().await;
        if item.is_none() {
            self.active.store(false, Ordering::SeqCst);
        }
        item
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Resolver answering every query with a fixed reply, recording the queries.
pub struct ScriptedResolver {
    reply: String,
    delay: Option<Duration>,
    pub queries: Mutex<Vec<String>>,
}

impl ScriptedResolver {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            delay: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(reply: impl Into<String>, delay: Duration) -> Self {
        Self {
            reply: reply.into(),
            delay: Some(delay),
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl QueryResolver for ScriptedResolver {
    async fn resolve(&self, query: &str) -> Result<String, ResolverError> {
        self.queries.lock().await.push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.reply.clone())
    }
}

/// Resolver that always fails.
pub struct FailingResolver;

#[async_trait]
impl QueryResolver for FailingResolver {
    async fn resolve(&self, _query: &str) -> Result<String, ResolverError> {
        Err(ResolverError::Request("backend unavailable".to_string()))
    }
}

/// Receive the next frame from a mock channel, bounded.
pub async fn next_frame(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Envelope {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("channel closed while waiting for frame")
}
