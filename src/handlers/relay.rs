//! Relay WebSocket handler
//!
//! Transport gateway for client connections. Each connection gets exactly one
//! [`Session`], created lazily when the first decodable frame arrives; the
//! session opens the bidirectional inference channel and a forwarder task
//! drains its output queue back to the client in FIFO order.
//!
//! Routing is by event kind: `audioInput` goes through the session's audio
//! queue, everything else is forwarded directly. Frames that fail to decode
//! are logged and skipped; the connection stays up.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::core::protocol::{Envelope, Event, decode};
use crate::core::{Session, ToolDispatcher, WsInferenceStream};
use crate::errors::TransportError;
use crate::state::AppState;

/// Relay WebSocket handler
///
/// Upgrades the HTTP connection to WebSocket for bidirectional voice/text
/// relaying against the inference backend.
pub async fn relay_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("relay WebSocket connection upgrade requested");
    ws.on_upgrade(move |socket| handle_relay_socket(socket, state))
}

/// Handle one relay WebSocket connection.
async fn handle_relay_socket(socket: WebSocket, state: Arc<AppState>) {
    info!("relay WebSocket connection established");

    let (sender, mut receiver) = socket.split();
    let mut sender_slot = Some(sender);
    let mut session: Option<Arc<Session>> = None;
    let mut forwarder: Option<JoinHandle<()>> = None;

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let envelope = match decode(&text) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!(error = %e, "skipping undecodable client frame");
                        continue;
                    }
                };

                let current = match &session {
                    Some(current) => current.clone(),
                    None => {
                        match open_session(&state).await {
                            Ok(opened) => {
                                // The forwarder takes the socket's send half
                                // together with the session's output queue
                                if let (Some(output), Some(sink)) =
                                    (opened.take_output().await, sender_slot.take())
                                {
                                    forwarder = Some(tokio::spawn(forward_responses(
                                        opened.id().to_string(),
                                        output,
                                        sink,
                                    )));
                                }
                                session = Some(opened.clone());
                                opened
                            }
                            Err(e) => {
                                error!(error = %e, "failed to open inference session, aborting connection");
                                break;
                            }
                        }
                    }
                };

                route_envelope(&current, &envelope).await;
            }
            Ok(Message::Close(_)) => {
                info!("relay WebSocket closed by client");
                break;
            }
            // The client protocol is JSON text; control frames are handled by
            // axum and anything else is ignored
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "relay WebSocket error");
                break;
            }
        }
    }

    // Cleanup; the forwarder never outlives a closed transport
    if let Some(session) = session {
        session.close().await;
    }
    if let Some(forwarder) = forwarder {
        forwarder.abort();
    }
    info!("relay WebSocket connection terminated");
}

/// Create the session for this connection: inference channel plus dispatch
/// bridge wired to the resolver injected at startup.
async fn open_session(state: &Arc<AppState>) -> Result<Arc<Session>, crate::errors::ConnectError> {
    let stream = Arc::new(WsInferenceStream::new(state.config.inference()));
    let dispatcher = ToolDispatcher::new(state.resolver.clone());
    Session::start(stream, dispatcher).await
}

/// Route one decoded client frame into the session.
async fn route_envelope(session: &Session, envelope: &Envelope) {
    match &envelope.event {
        Event::AudioInput(audio) => {
            session.enqueue_audio(
                audio.prompt_name.clone(),
                audio.content_name.clone(),
                audio.content.clone(),
            );
        }
        _ => {
            if let Err(e) = session.send_event(envelope).await {
                warn!(
                    session_id = %session.id(),
                    kind = envelope.event.kind(),
                    error = %e,
                    "failed to forward client event"
                );
            }
        }
    }
}

/// Drain the session's output queue to the client, FIFO, until the session
/// deactivates or the transport closes.
async fn forward_responses(
    session_id: String,
    mut output: mpsc::UnboundedReceiver<Envelope>,
    mut sink: SplitSink<WebSocket, Message>,
) {
    while let Some(envelope) = output.recv().await {
        let json = match serde_json::to_string(&envelope) {
            Ok(json) => json,
            Err(e) => {
                error!(session_id = %session_id, error = %e, "failed to serialize outbound frame");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(json.into())).await {
            let err = TransportError::Send(e.to_string());
            info!(session_id = %session_id, error = %err, "client transport closed during forwarding");
            break;
        }
    }
    debug!(session_id = %session_id, "response forwarding stopped");
}
