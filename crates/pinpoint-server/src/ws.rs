use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};

use pinpoint_core::net::messages::{ClientMessage, ErrorKind, ErrorMsg, ServerMessage};
use pinpoint_core::net::protocol::{
    PROTOCOL_VERSION, decode_client_message, decode_message_type, encode_server_message,
    max_size_for,
};
use pinpoint_core::player::ConnectionId;

use crate::room_manager::SessionSender;
use crate::session::{RoomCommand, SessionContext};
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (ws_sender, mut ws_receiver) = socket.split();

    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);
    spawn_writer(ws_sender, rx);

    // First frame must be CreateRoom or JoinRoom.
    let first_msg = match ws_receiver.next().await {
        Some(Ok(Message::Binary(data))) => data,
        _ => return,
    };
    let Ok(client_msg) = decode_client_message(&first_msg) else {
        send_error(&tx, ErrorKind::Validation, "malformed handshake").await;
        return;
    };

    let seated = match client_msg {
        ClientMessage::CreateRoom(create) => {
            if !protocol_version_ok(create.protocol_version) {
                send_version_error(&tx, create.protocol_version).await;
                return;
            }
            if !valid_name(&create.player_name) {
                send_error(&tx, ErrorKind::Validation, "invalid player name").await;
                return;
            }
            let settings = create
                .settings
                .map(Into::into)
                .unwrap_or_else(|| state.config.game.default_settings());
            let ctx = SessionContext {
                rooms: Arc::clone(&state.rooms),
                images: Arc::clone(&state.images),
                rooms_cfg: state.config.rooms.clone(),
            };
            let result = {
                let mut mgr = state.rooms.write().await;
                mgr.create_room(
                    &create.room_code,
                    create.player_name.trim().to_string(),
                    settings,
                    state.config.game.scoring,
                    tx.clone(),
                    ctx,
                )
            };
            match result {
                Ok((code, conn_id)) => {
                    // The session pushes RoomCreated itself.
                    let session_tx = {
                        let mgr = state.rooms.read().await;
                        mgr.session(&code)
                    };
                    session_tx.map(|s| (code, conn_id, s))
                },
                Err(err) => {
                    send_error_msg(&tx, err).await;
                    return;
                },
            }
        },
        ClientMessage::JoinRoom(join) => {
            if !protocol_version_ok(join.protocol_version) {
                send_version_error(&tx, join.protocol_version).await;
                return;
            }
            let lookup = {
                let mut mgr = state.rooms.write().await;
                mgr.session(&join.room_code)
                    .map(|s| (mgr.alloc_connection_id(), s))
            };
            let Some((conn_id, session_tx)) = lookup else {
                send_error(&tx, ErrorKind::NotFound, "room not found").await;
                return;
            };

            let (reply_tx, reply_rx) = oneshot::channel();
            let join_cmd = RoomCommand::Join {
                conn_id,
                name: join.player_name.clone(),
                sender: tx.clone(),
                reply: reply_tx,
            };
            if session_tx.send(join_cmd).is_err() {
                send_error(&tx, ErrorKind::NotFound, "room not found").await;
                return;
            }
            match reply_rx.await {
                Ok(Ok(())) => Some((join.room_code, conn_id, session_tx)),
                Ok(Err(err)) => {
                    send_error_msg(&tx, err).await;
                    return;
                },
                Err(_) => return,
            }
        },
        _ => {
            send_error(
                &tx,
                ErrorKind::Validation,
                "first message must create or join a room",
            )
            .await;
            return;
        },
    };

    let Some((room_code, conn_id, session_tx)) = seated else {
        return;
    };

    read_loop(&mut ws_receiver, &state, &session_tx, &room_code, conn_id).await;

    // Socket gone; the session marks the player disconnected.
    let _ = session_tx.send(RoomCommand::Disconnect { conn_id });
    tracing::info!(conn_id, room_code = %room_code, "Connection closed");
}

fn protocol_version_ok(version: u8) -> bool {
    version == 0 || version == PROTOCOL_VERSION
}

fn valid_name(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && name.len() <= 32 && !name.chars().any(|c| c.is_control())
}

async fn send_error(tx: &mpsc::Sender<Bytes>, kind: ErrorKind, message: &str) {
    send_error_msg(
        tx,
        ErrorMsg {
            kind,
            message: message.to_string(),
        },
    )
    .await;
}

async fn send_version_error(tx: &mpsc::Sender<Bytes>, client_version: u8) {
    send_error(
        tx,
        ErrorKind::Validation,
        &format!("protocol version mismatch: client={client_version}, server={PROTOCOL_VERSION}"),
    )
    .await;
}

async fn send_error_msg(tx: &mpsc::Sender<Bytes>, err: ErrorMsg) {
    if let Ok(data) = encode_server_message(&ServerMessage::Error(err))
        && tx.send(Bytes::from(data)).await.is_err()
    {
        tracing::debug!("Failed to deliver error to closing connection");
    }
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    session_tx: &SessionSender,
    room_code: &str,
    conn_id: ConnectionId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            _ => continue,
        };

        if data.is_empty() {
            continue;
        }

        // Rate limit: drop messages that exceed per-connection rate
        if !rate_limiter.allow() {
            tracing::warn!(conn_id, room_code, "Rate limited");
            continue;
        }

        // Drop oversized frames; only image uploads get the larger cap
        let msg_type = match decode_message_type(&data) {
            Ok(t) => t,
            Err(_) => continue,
        };
        if data.len() > max_size_for(msg_type) {
            tracing::debug!(conn_id, room_code, ?msg_type, "Dropping oversized frame");
            continue;
        }

        let client_msg = match decode_client_message(&data) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(conn_id, room_code, error = %e, "Malformed message");
                continue;
            },
        };

        let leaving = matches!(client_msg, ClientMessage::LeaveRoom);
        if session_tx
            .send(RoomCommand::Client {
                conn_id,
                msg: client_msg,
            })
            .is_err()
        {
            // Session torn down while we were reading.
            break;
        }
        if leaving {
            break;
        }
    }
}
