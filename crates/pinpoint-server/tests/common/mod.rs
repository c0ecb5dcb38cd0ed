#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use pinpoint_core::net::messages::{
    ClientMessage, CreateRoomMsg, JoinRoomMsg, ServerMessage, SettingsMsg,
};
use pinpoint_core::net::protocol::{
    PROTOCOL_VERSION, decode_server_message, encode_client_message,
};

use pinpoint_server::build_app;
use pinpoint_server::config::{RoomsConfig, ServerConfig};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with default config.
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    /// Start a test server with no between-round delay, for fast game flows.
    pub async fn fast() -> Self {
        let config = ServerConfig {
            rooms: RoomsConfig {
                between_round_secs: 0,
                ..RoomsConfig::default()
            },
            ..ServerConfig::default()
        };
        Self::from_config(config).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Millisecond-scale room settings so tests never wait on wall-clock rounds.
pub fn fast_settings(total_rounds: u32) -> SettingsMsg {
    SettingsMsg {
        view_time_ms: 50,
        guess_time_ms: 300,
        total_rounds,
        min_players: 2,
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsClient {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

pub async fn ws_send(stream: &mut WsClient, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Read the next binary frame, panicking after 2 seconds.
pub async fn ws_read_raw(stream: &mut WsClient) -> Vec<u8> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("timed out waiting for server message")
            .expect("connection closed")
            .expect("websocket error");
        if let Message::Binary(data) = msg {
            return data.to_vec();
        }
    }
}

/// Read and decode the next server message.
pub async fn ws_recv(stream: &mut WsClient) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Read messages until one matches the predicate, skipping the rest.
pub async fn ws_recv_until<F>(stream: &mut WsClient, mut pred: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    for _ in 0..50 {
        let msg = ws_recv(stream).await;
        if pred(&msg) {
            return msg;
        }
    }
    panic!("no matching message within 50 frames");
}

/// Create a room over a fresh handshake. Returns (room_code, player_id).
pub async fn ws_create_room(
    stream: &mut WsClient,
    name: &str,
    settings: Option<SettingsMsg>,
) -> (String, u64) {
    let msg = ClientMessage::CreateRoom(CreateRoomMsg {
        room_code: String::new(),
        player_name: name.to_string(),
        settings,
        protocol_version: PROTOCOL_VERSION,
    });
    ws_send(stream, &msg).await;

    match ws_recv(stream).await {
        ServerMessage::RoomCreated(created) => (created.room_code, created.player_id),
        other => panic!("Expected RoomCreated, got: {other:?}"),
    }
}

/// Join an existing room over a fresh handshake. Returns the player id.
pub async fn ws_join_room(stream: &mut WsClient, code: &str, name: &str) -> u64 {
    let msg = ClientMessage::JoinRoom(JoinRoomMsg {
        room_code: code.to_string(),
        player_name: name.to_string(),
        protocol_version: PROTOCOL_VERSION,
    });
    ws_send(stream, &msg).await;

    match ws_recv(stream).await {
        ServerMessage::RoomJoined(joined) => joined.player_id,
        other => panic!("Expected RoomJoined, got: {other:?}"),
    }
}

/// A tiny valid payload for upload tests (content is not sniffed).
pub fn png_bytes() -> Vec<u8> {
    vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4]
}
