//! Per-connection session: state machine, queues, and owned tasks.
//!
//! A session owns one inference channel and two loops running against it:
//! draining the audio queue into the channel, and pulling backend frames into
//! the output queue for the client-side forwarder. Tool dispatch runs inline
//! in the receive loop, so it serializes with frame handling for this session
//! and nothing else.
//!
//! Lifecycle: IDLE -> STREAMING on channel open, STREAMING -> CLOSING on
//! sessionEnd, transport disconnect, unrecoverable stream error or an
//! explicit [`Session::close`], CLOSING -> CLOSED once every owned task has
//! stopped. The transition into CLOSED happens exactly once no matter how
//! many callers race on `close()`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::dispatch::{PendingToolUse, ToolDispatcher};
use crate::core::inference::InferenceStream;
use crate::core::protocol::{ContentType, Envelope, Event};
use crate::errors::{ConnectError, StreamError};

/// Upper bound on one whole tool dispatch (extract, resolve, normalize).
/// The resolver call itself carries no timeout of its own.
pub const TOOL_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Created, channel not yet open
    Idle = 0,
    /// Channel open, loops running
    Streaming = 1,
    /// Teardown in progress
    Closing = 2,
    /// Terminal
    Closed = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Idle,
            1 => SessionState::Streaming,
            2 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

/// One queued audio chunk, kept in submission order.
#[derive(Debug)]
struct AudioChunk {
    prompt_name: String,
    content_name: String,
    content: String,
}

/// Per-connection state machine and queues.
pub struct Session {
    id: String,
    state: Arc<AtomicU8>,
    /// The single cancellation signal every owned loop observes.
    active: CancellationToken,
    stream: Arc<dyn InferenceStream>,
    audio_tx: mpsc::UnboundedSender<AudioChunk>,
    output_rx: Mutex<Option<mpsc::UnboundedReceiver<Envelope>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open the inference channel and start the session loops.
    ///
    /// Fails with the channel's [`ConnectError`] if the handshake does not
    /// complete; the caller aborts the connection in that case.
    pub async fn start(
        stream: Arc<dyn InferenceStream>,
        dispatcher: ToolDispatcher,
    ) -> Result<Arc<Self>, ConnectError> {
        let id = Uuid::new_v4().to_string();
        stream.open().await?;

        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let (output_tx, output_rx) = mpsc::unbounded_channel();

        let session = Arc::new(Self {
            id: id.clone(),
            state: Arc::new(AtomicU8::new(SessionState::Streaming as u8)),
            active: CancellationToken::new(),
            stream: stream.clone(),
            audio_tx,
            output_rx: Mutex::new(Some(output_rx)),
            tasks: Mutex::new(Vec::new()),
        });

        let drain = tokio::spawn(audio_drain_loop(
            id.clone(),
            stream,
            audio_rx,
            session.active.clone(),
        ));
        let receive = tokio::spawn(receive_loop(session.clone(), dispatcher, output_tx));
        session.tasks.lock().await.extend([drain, receive]);

        info!(session_id = %id, "session streaming");
        Ok(session)
    }

    /// Session identity, for log correlation.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Whether the session still relays frames.
    pub fn is_active(&self) -> bool {
        !self.active.is_cancelled() && self.state() == SessionState::Streaming
    }

    /// Append one audio chunk to the audio queue. Non-blocking; chunks are
    /// forwarded to the channel in submission order.
    pub fn enqueue_audio(
        &self,
        prompt_name: impl Into<String>,
        content_name: impl Into<String>,
        content: impl Into<String>,
    ) {
        let chunk = AudioChunk {
            prompt_name: prompt_name.into(),
            content_name: content_name.into(),
            content: content.into(),
        };
        if self.audio_tx.send(chunk).is_err() {
            debug!(session_id = %self.id, "audio chunk dropped, session closed");
        }
    }

    /// Forward a non-audio event directly to the channel, bypassing the audio
    /// queue and preserving caller order. Sending `sessionEnd` tears the
    /// session down after the frame goes out.
    pub async fn send_event(&self, envelope: &Envelope) -> Result<(), StreamError> {
        let result = self.stream.send(envelope).await;
        if matches!(envelope.event, Event::SessionEnd(_)) {
            self.close().await;
        }
        result
    }

    /// Hand the output queue to the response forwarder. Yields `Some` exactly
    /// once.
    pub async fn take_output(&self) -> Option<mpsc::UnboundedReceiver<Envelope>> {
        self.output_rx.lock().await.take()
    }

    /// Tear the session down. Idempotent and safe under concurrent
    /// invocation from the transport-close handler and the channel's own
    /// termination path; the state reaches CLOSED exactly once.
    pub async fn close(&self) {
        loop {
            let current = self.state.load(Ordering::SeqCst);
            if current >= SessionState::Closing as u8 {
                return;
            }
            if self
                .state
                .compare_exchange(
                    current,
                    SessionState::Closing as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                break;
            }
        }

        info!(session_id = %self.id, "session closing");
        self.active.cancel();
        self.stream.shutdown().await;

        // Joining from a separate task keeps close() safe when invoked from
        // inside one of the owned loops
        let handles: Vec<_> = self.tasks.lock().await.drain(..).collect();
        let state = self.state.clone();
        let id = self.id.clone();
        tokio::spawn(async move {
            for handle in handles {
                let _ = handle.await;
            }
            state.store(SessionState::Closed as u8, Ordering::SeqCst);
            debug!(session_id = %id, "session closed");
        });
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Drain queued audio chunks into the inference channel, in order.
async fn audio_drain_loop(
    session_id: String,
    stream: Arc<dyn InferenceStream>,
    mut audio_rx: mpsc::UnboundedReceiver<AudioChunk>,
    active: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = active.cancelled() => break,
            chunk = audio_rx.recv() => match chunk {
                Some(chunk) => {
                    let envelope = Envelope::audio_input(
                        chunk.prompt_name,
                        chunk.content_name,
                        chunk.content,
                    );
                    if let Err(e) = stream.send(&envelope).await {
                        warn!(session_id = %session_id, error = %e, "failed to forward audio frame");
                    }
                }
                None => break,
            },
        }
    }
    debug!(session_id = %session_id, "audio drain loop stopped");
}

/// Pull backend frames into the output queue, intercepting tool invocations
/// inline.
async fn receive_loop(
    session: Arc<Session>,
    dispatcher: ToolDispatcher,
    output_tx: mpsc::UnboundedSender<Envelope>,
) {
    let mut pending: Option<PendingToolUse> = None;

    loop {
        let item = tokio::select! {
            _ = session.active.cancelled() => break,
            item = session.stream.receive() => item,
        };

        let mut envelope = match item {
            Some(Ok(envelope)) => envelope,
            Some(Err(e)) => {
                error!(session_id = %session.id, error = %e, "inference stream failed");
                break;
            }
            None => {
                info!(session_id = %session.id, "inference stream ended");
                break;
            }
        };

        match &envelope.event {
            Event::ToolUse(tool_use) => {
                if pending.is_some() {
                    warn!(
                        session_id = %session.id,
                        tool_use_id = %tool_use.tool_use_id,
                        "replacing unfinished pending tool use"
                    );
                }
                debug!(
                    session_id = %session.id,
                    tool_name = %tool_use.tool_name,
                    tool_use_id = %tool_use.tool_use_id,
                    "tool use detected"
                );
                pending = Some(PendingToolUse::from_tool_use(tool_use));
            }
            Event::ContentEnd(end) if end.content_type == Some(ContentType::Tool) => {
                match pending.take() {
                    Some(tool_use) => {
                        dispatch_tool_use(&session, &dispatcher, tool_use, end.prompt_name.clone())
                            .await;
                    }
                    None => warn!(
                        session_id = %session.id,
                        prompt_name = %end.prompt_name,
                        content_name = %end.content_name,
                        "tool content ended with no pending tool use"
                    ),
                }
            }
            _ => {}
        }

        let end_of_session = matches!(envelope.event, Event::SessionEnd(_));
        envelope.timestamp = Some(epoch_millis());
        if output_tx.send(envelope).is_err() {
            debug!(session_id = %session.id, "output queue gone, stopping receive loop");
            break;
        }
        if end_of_session {
            info!(session_id = %session.id, "sessionEnd observed");
            break;
        }
    }

    drop(output_tx);
    session.close().await;
}

/// Resolve one completed tool invocation and re-inject its result.
///
/// Failures and timeouts degrade to an error-string result; they never abort
/// the session.
async fn dispatch_tool_use(
    session: &Session,
    dispatcher: &ToolDispatcher,
    mut pending: PendingToolUse,
    prompt_name: String,
) {
    pending.prompt_name = Some(prompt_name.clone());

    let text = match tokio::time::timeout(TOOL_DISPATCH_TIMEOUT, dispatcher.resolve(&pending)).await
    {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(
                session_id = %session.id,
                tool_name = %pending.tool_name,
                tool_use_id = %pending.tool_use_id,
                error = %e,
                "tool query failed"
            );
            ToolDispatcher::error_result(&e.to_string())
        }
        Err(_) => {
            warn!(
                session_id = %session.id,
                tool_name = %pending.tool_name,
                tool_use_id = %pending.tool_use_id,
                "tool query timed out"
            );
            ToolDispatcher::error_result("the request took too long to complete")
        }
    };

    if let Err(e) = dispatcher
        .emit_result(
            session.stream.as_ref(),
            &prompt_name,
            &pending.tool_use_id,
            &text,
        )
        .await
    {
        error!(
            session_id = %session.id,
            tool_use_id = %pending.tool_use_id,
            error = %e,
            "failed to re-inject tool result"
        );
    }
}
