// crates/server/src/transport.rs
//! WebSocket transport: per-client handshake state machine, inbound
//! event batches, outbound command request/response with timeout.
//!
//! Uses axum's native `extract::ws` — upgrade inside a route handler,
//! `on_upgrade` owns the per-connection loop — rather than a bare
//! `tokio-tungstenite` listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use runtimescope_types::{
    BuildMeta, CommandPayload, CommandResponsePayload, EventBatchPayload, EventHeader, HandshakePayload, MessageType,
    RuntimeEvent, SessionEventFields, SessionInfo, WireEnvelope,
};

use crate::connections::ConnectionGuard;
use crate::error::TransportError;
use crate::state::ServerState;

pub fn router() -> Router<Arc<ServerState>> {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut sink, mut stream) = socket.split();

    // Outbound writes go through a dedicated forwarding task fed by an
    // mpsc channel, so the read loop and outbound `sendCommand` calls never
    // contend on the same sink.
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let forward_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let state_for_drop = state.clone();
    let guard = ConnectionGuard::new(state.connections.clone(), Arc::new(move |session_id: String| {
        let state = state_for_drop.clone();
        tokio::spawn(async move {
            state.handle_disconnect(&session_id, now_ms()).await;
        });
    }));

    while let Some(frame) = stream.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(err) => {
                debug!(error = %err, "websocket read error; closing connection");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                handle_text_frame(&state, &guard, &tx, &text).await;
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
        }
    }

    forward_task.abort();
}

async fn handle_text_frame(state: &Arc<ServerState>, guard: &ConnectionGuard<impl Fn(String) + Send + Sync + 'static>, tx: &mpsc::UnboundedSender<Message>, text: &str) {
    let envelope: WireEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            // Malformed JSON or unknown `type`: log and drop. Connection
            // stays open.
            warn!(error = %err, "malformed inbound frame; dropping");
            return;
        }
    };

    match envelope.message_type {
        MessageType::Handshake => handle_handshake(state, guard, tx.clone(), envelope.session_id, envelope.payload).await,
        MessageType::Event => handle_event_batch(state, envelope.session_id, envelope.payload).await,
        MessageType::Heartbeat => {}
        MessageType::CommandResponse => handle_command_response(state, envelope.payload),
        MessageType::Command => {
            // `command` is server->SDK only; a client sending one is
            // unrecognized traffic for this direction. Log and ignore.
            debug!("ignoring inbound `command` frame (server->client only)");
        }
    }
}

async fn handle_handshake(state: &Arc<ServerState>, guard: &ConnectionGuard<impl Fn(String) + Send + Sync + 'static>, tx: mpsc::UnboundedSender<Message>, session_id: String, payload: Value) {
    let handshake: HandshakePayload = match serde_json::from_value(payload) {
        Ok(handshake) => handshake,
        Err(err) => {
            warn!(error = %err, "malformed handshake payload; dropping");
            return;
        }
    };

    // Second handshake on the same connection is undefined behavior per
    // Undefined behavior; we take the conservative option and ignore it once bound.
    guard.bind(session_id.clone(), tx);

    let project = handshake.app_name.clone();
    state.bind_session_project(&session_id, &project);
    let store = state.registry.get_or_create(&project);

    let connected_at = now_ms();
    let session_event = RuntimeEvent::Session(SessionEventFields {
        header: EventHeader {
            event_id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.clone(),
            timestamp: connected_at,
        },
        app_name: handshake.app_name.clone(),
        connected_at,
        sdk_version: handshake.sdk_version.clone(),
        build_meta: None::<BuildMeta>,
    });
    store.add_event(session_event);

    if let Some(info) = store.session(&session_id) {
        state.persist_session(&info, &project).await;
    } else {
        // Defensive: `add_event` always creates the session record for a
        // `session` event, so this branch is unreachable in practice.
        let info = SessionInfo::new(session_id.clone(), handshake.app_name, connected_at, handshake.sdk_version);
        state.persist_session(&info, &project).await;
    }

    info!(session_id = %session_id, project = %project, "session registered");
}

async fn handle_event_batch(state: &Arc<ServerState>, session_id: String, payload: Value) {
    let batch: EventBatchPayload = match serde_json::from_value(payload) {
        Ok(batch) => batch,
        Err(err) => {
            warn!(error = %err, "malformed event batch payload; dropping");
            return;
        }
    };

    let Some(store) = state.store_for_session(&session_id) else {
        // Events for a session that never handshook (PRE-AUTH state):
        // log and drop rather than guessing at a project.
        warn!(session_id = %session_id, "event batch for unregistered session; dropping");
        return;
    };

    for event in batch.events {
        store.add_event(event);
    }
}

fn handle_command_response(state: &Arc<ServerState>, payload: Value) {
    let response: CommandResponsePayload = match serde_json::from_value(payload) {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "malformed command_response payload; dropping");
            return;
        }
    };
    state.pending.resolve(&response.request_id, response.result);
}

/// Sends a command to the SDK registered for `session_id` and awaits the
/// correlated `command_response`.
pub async fn send_command(state: &ServerState, session_id: &str, command: &str, request_id: String, params: Option<Value>, timeout: Duration) -> Result<Value, TransportError> {
    let Some(sender) = state.connections.get(session_id) else {
        return Err(TransportError::NoActiveConnection);
    };

    let rx = state.pending.register(request_id.clone());

    let envelope = WireEnvelope {
        message_type: MessageType::Command,
        payload: serde_json::to_value(CommandPayload {
            command: command.to_string(),
            request_id: request_id.clone(),
            params,
        })
        .expect("CommandPayload always serializes"),
        timestamp: now_ms(),
        session_id: session_id.to_string(),
    };
    let frame = serde_json::to_string(&envelope).expect("WireEnvelope always serializes");

    if sender.send(Message::Text(frame.into())).is_err() {
        state.pending.remove(&request_id);
        return Err(TransportError::SendFailed("connection closed".to_string()));
    }

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(_)) => Err(TransportError::Cancelled),
        Err(_elapsed) => {
            state.pending.remove(&request_id);
            Err(TransportError::TimedOut(timeout.as_millis() as u64))
        }
    }
}

/// Binds with a fixed-delay retry on conflict (`maxRetries`, `retryDelayMs`),
/// then serves `app` until shutdown.
pub async fn serve(state: Arc<ServerState>, app: Router) -> std::io::Result<()> {
    let addr = SocketAddr::new(state.config.host, state.config.port);
    let max_retries = state.config.max_retries;
    let retry_delay = Duration::from_millis(state.config.retry_delay_ms);

    let mut attempt = 0;
    let listener = loop {
        match TcpListener::bind(addr).await {
            Ok(listener) => break listener,
            Err(err) if attempt < max_retries => {
                attempt += 1;
                warn!(%addr, attempt, max_retries, error = %err, "bind failed; retrying");
                tokio::time::sleep(retry_delay).await;
            }
            Err(err) => {
                return Err(err);
            }
        }
    };

    info!(%addr, "transport listening");
    let result = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;
    // Fail every pending outbound command waiter before exiting.
    state.pending.fail_all();
    result
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
