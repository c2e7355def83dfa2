//! Assistant WebSocket handler
//!
//! One WebSocket connection is one session. The foreground loop decodes
//! client frames and feeds them to the session's [`TurnCoordinator`], applies
//! the events posted by backend tasks, and enforces the idle timeout. A
//! dedicated sender task owns the write half of the socket.

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tokio::{select, task::JoinHandle};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::core::turn::{ClientCommand, SessionEvent, TurnCoordinator, TurnSettings};
use crate::errors::SessionError;
use crate::middleware::SessionSlot;
use crate::state::AppState;

use super::messages::{MessageRoute, parse_command};

/// Optimized channel buffer size for audio workloads
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// How long queued outbound frames may take to flush after the session ends
const SENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Assistant WebSocket handler
///
/// Upgrades the HTTP connection to a WebSocket carrying one assistant
/// session. The connection slot reserved by the connection-limit
/// middleware, if any, moves into the session and is freed when it ends.
pub async fn assistant_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    slot: Option<Extension<SessionSlot>>,
) -> Response {
    let slot = slot.map(|Extension(slot)| slot);
    debug!(ip = ?slot.as_ref().map(SessionSlot::ip), "Assistant WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| {
            let session_id = uuid::Uuid::new_v4().to_string();
            let span = info_span!("session", session_id = %session_id);
            handle_assistant_socket(socket, state, session_id, slot).instrument(span)
        })
}

/// Run one session until the client goes away or idles out.
async fn handle_assistant_socket(
    socket: WebSocket,
    app_state: Arc<AppState>,
    session_id: String,
    _slot: Option<SessionSlot>,
) {
    info!("Assistant WebSocket connection established");

    let (sender, mut receiver) = socket.split();
    let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(CHANNEL_BUFFER_SIZE);
    let mut sender_task = spawn_sender(sender, event_rx);

    let backends = match app_state.connector.connect(&session_id) {
        Ok(backends) => backends,
        Err(e) => {
            error!(error = %e, "Failed to create backend clients");
            let error = SessionError::from(e);
            let _ = event_tx
                .send(SessionEvent::Error {
                    code: error.code(),
                    message: error.to_string(),
                })
                .await;
            drop(event_tx);
            finish_sender(&mut sender_task).await;
            return;
        }
    };

    let settings = TurnSettings::from(&app_state.config);
    let (mut coordinator, mut backend_events) =
        TurnCoordinator::new(session_id, backends, settings, event_tx);

    let idle_timeout = app_state.config.idle_timeout();
    let mut last_activity = Instant::now();

    loop {
        select! {
            msg_result = receiver.next() => {
                last_activity = Instant::now();

                match msg_result {
                    Some(Ok(msg)) => {
                        if !process_message(msg, &mut coordinator).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Assistant WebSocket error");
                        break;
                    }
                    None => {
                        info!("Assistant WebSocket connection closed by client");
                        break;
                    }
                }
            }
            Some(event) = backend_events.recv() => {
                // Backend output counts as activity
                last_activity = Instant::now();
                coordinator.handle_backend_event(event).await;
            }
            _ = tokio::time::sleep_until(last_activity + idle_timeout) => {
                warn!(
                    idle_secs = idle_timeout.as_secs(),
                    "Assistant WebSocket connection idle, closing"
                );
                coordinator
                    .report(SessionError::IdleTimeout(
                        "Connection closed due to inactivity".to_string(),
                    ))
                    .await;
                break;
            }
        }
    }

    // Readers blocked on a full event channel must not hold up teardown
    backend_events.close();
    coordinator.shutdown().await;

    // Dropping the coordinator drops the last event sender; the sender task
    // flushes what is queued, closes the socket and exits.
    drop(coordinator);
    finish_sender(&mut sender_task).await;

    info!("Assistant WebSocket connection terminated");
}

/// Spawn the task that owns the write half of the socket.
fn spawn_sender<S>(mut sender: S, mut events: mpsc::Receiver<SessionEvent>) -> JoinHandle<()>
where
    S: futures::Sink<Message> + Unpin + Send + 'static,
    S::Error: std::fmt::Display,
{
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let result = match MessageRoute::from(event) {
                MessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                MessageRoute::Audio(data) => sender.send(Message::Binary(data)).await,
            };

            if let Err(e) = result {
                debug!("Failed to send WebSocket message: {}", e);
                return;
            }
        }

        let _ = sender.send(Message::Close(None)).await;
    })
}

async fn finish_sender(sender_task: &mut JoinHandle<()>) {
    if tokio::time::timeout(SENDER_DRAIN_TIMEOUT, &mut *sender_task)
        .await
        .is_err()
    {
        debug!("Sender task did not finish in time, aborting");
        sender_task.abort();
    }
}

/// Process one inbound frame. Returns false when the session should end.
async fn process_message(msg: Message, coordinator: &mut TurnCoordinator) -> bool {
    match msg {
        Message::Text(text) => {
            debug!("Received text message: {} bytes", text.len());

            match parse_command(text.as_str()) {
                Ok(command) => coordinator.handle_command(command).await,
                Err(e) => {
                    warn!(error = %e, "Rejecting client message");
                    coordinator.report(e).await;
                }
            }
            true
        }
        Message::Binary(data) => {
            if data.is_empty() {
                debug!("Ignoring empty audio frame");
                return true;
            }
            debug!("Received binary audio: {} bytes", data.len());
            coordinator.handle_command(ClientCommand::Audio(data)).await;
            true
        }
        Message::Ping(_) => {
            debug!("Received ping");
            true
        }
        Message::Pong(_) => {
            debug!("Received pong");
            true
        }
        Message::Close(_) => {
            info!("Assistant WebSocket close received");
            false
        }
    }
}
