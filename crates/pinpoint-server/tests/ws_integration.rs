mod common;

use futures::SinkExt;
use tokio_tungstenite::tungstenite::Message;

use common::*;
use pinpoint_core::net::messages::{
    ClientMessage, CreateRoomMsg, ErrorKind, JoinRoomMsg, ServerMessage,
};
use pinpoint_core::net::protocol::PROTOCOL_VERSION;
use pinpoint_core::room::{Phase, is_valid_room_code};

#[tokio::test]
async fn create_room_returns_valid_code_and_snapshot() {
    let server = TestServer::new().await;
    let mut host = ws_connect(&server.ws_url()).await;

    let msg = ClientMessage::CreateRoom(CreateRoomMsg {
        room_code: String::new(),
        player_name: "Alice".to_string(),
        settings: None,
        protocol_version: PROTOCOL_VERSION,
    });
    ws_send(&mut host, &msg).await;

    match ws_recv(&mut host).await {
        ServerMessage::RoomCreated(created) => {
            assert!(is_valid_room_code(&created.room_code));
            assert_eq!(created.snapshot.phase, Phase::Lobby);
            assert_eq!(created.snapshot.players.len(), 1);
            assert!(created.snapshot.players[0].is_host);
            assert_eq!(created.snapshot.host_id, created.player_id);
        },
        other => panic!("Expected RoomCreated, got: {other:?}"),
    }
}

#[tokio::test]
async fn create_room_with_explicit_code() {
    let server = TestServer::new().await;
    let mut host = ws_connect(&server.ws_url()).await;

    let msg = ClientMessage::CreateRoom(CreateRoomMsg {
        room_code: "PARTY1".to_string(),
        player_name: "Alice".to_string(),
        settings: None,
        protocol_version: PROTOCOL_VERSION,
    });
    ws_send(&mut host, &msg).await;

    match ws_recv(&mut host).await {
        ServerMessage::RoomCreated(created) => assert_eq!(created.room_code, "PARTY1"),
        other => panic!("Expected RoomCreated, got: {other:?}"),
    }

    // A second room with the same code is rejected
    let mut other = ws_connect(&server.ws_url()).await;
    let msg = ClientMessage::CreateRoom(CreateRoomMsg {
        room_code: "PARTY1".to_string(),
        player_name: "Bob".to_string(),
        settings: None,
        protocol_version: PROTOCOL_VERSION,
    });
    ws_send(&mut other, &msg).await;

    match ws_recv(&mut other).await {
        ServerMessage::Error(err) => assert_eq!(err.kind, ErrorKind::Conflict),
        other => panic!("Expected Error, got: {other:?}"),
    }
}

#[tokio::test]
async fn join_broadcasts_player_joined() {
    let server = TestServer::new().await;
    let mut host = ws_connect(&server.ws_url()).await;
    let (code, _host_id) = ws_create_room(&mut host, "Alice", None).await;

    let mut player = ws_connect(&server.ws_url()).await;
    let player_id = ws_join_room(&mut player, &code, "Bob").await;

    let msg = ws_recv_until(&mut host, |m| matches!(m, ServerMessage::PlayerJoined(_))).await;
    match msg {
        ServerMessage::PlayerJoined(joined) => {
            assert_eq!(joined.player.id, player_id);
            assert_eq!(joined.player.display_name, "Bob");
            assert_eq!(joined.player_count, 2);
        },
        other => panic!("Expected PlayerJoined, got: {other:?}"),
    }
}

#[tokio::test]
async fn join_unknown_room_fails() {
    let server = TestServer::new().await;
    let mut player = ws_connect(&server.ws_url()).await;

    let msg = ClientMessage::JoinRoom(JoinRoomMsg {
        room_code: "ZZZZZZ".to_string(),
        player_name: "Bob".to_string(),
        protocol_version: PROTOCOL_VERSION,
    });
    ws_send(&mut player, &msg).await;

    match ws_recv(&mut player).await {
        ServerMessage::Error(err) => assert_eq!(err.kind, ErrorKind::NotFound),
        other => panic!("Expected Error, got: {other:?}"),
    }
}

#[tokio::test]
async fn invalid_player_name_rejected() {
    let server = TestServer::new().await;
    let mut host = ws_connect(&server.ws_url()).await;

    let msg = ClientMessage::CreateRoom(CreateRoomMsg {
        room_code: String::new(),
        player_name: "   ".to_string(),
        settings: None,
        protocol_version: PROTOCOL_VERSION,
    });
    ws_send(&mut host, &msg).await;

    match ws_recv(&mut host).await {
        ServerMessage::Error(err) => assert_eq!(err.kind, ErrorKind::Validation),
        other => panic!("Expected Error, got: {other:?}"),
    }
}

#[tokio::test]
async fn protocol_version_mismatch_rejected() {
    let server = TestServer::new().await;
    let mut host = ws_connect(&server.ws_url()).await;

    let msg = ClientMessage::CreateRoom(CreateRoomMsg {
        room_code: String::new(),
        player_name: "Alice".to_string(),
        settings: None,
        protocol_version: 99,
    });
    ws_send(&mut host, &msg).await;

    match ws_recv(&mut host).await {
        ServerMessage::Error(err) => {
            assert_eq!(err.kind, ErrorKind::Validation);
            assert!(err.message.contains("protocol version"));
        },
        other => panic!("Expected Error, got: {other:?}"),
    }
}

#[tokio::test]
async fn garbage_first_frame_gets_error() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.ws_url()).await;

    stream
        .send(Message::Binary(vec![0xFF, 0x00, 0x01].into()))
        .await
        .unwrap();

    match ws_recv(&mut stream).await {
        ServerMessage::Error(err) => assert_eq!(err.kind, ErrorKind::Validation),
        other => panic!("Expected Error, got: {other:?}"),
    }
}

#[tokio::test]
async fn health_endpoint_reports_rooms() {
    let server = TestServer::new().await;
    let mut host = ws_connect(&server.ws_url()).await;
    let _ = ws_create_room(&mut host, "Alice", None).await;

    let body: serde_json::Value = reqwest::get(format!("{}/health", server.base_url()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["rooms"]["active"], 1);
    assert_eq!(body["rooms"]["players"], 1);
}

#[tokio::test]
async fn ready_endpoint() {
    let server = TestServer::new().await;
    let body = reqwest::get(format!("{}/ready", server.base_url()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "ready");
}

#[tokio::test]
async fn host_disconnect_migrates_host() {
    let server = TestServer::new().await;
    let mut host = ws_connect(&server.ws_url()).await;
    let (code, _host_id) = ws_create_room(&mut host, "Alice", None).await;

    let mut player = ws_connect(&server.ws_url()).await;
    let player_id = ws_join_room(&mut player, &code, "Bob").await;

    drop(host);

    let msg = ws_recv_until(&mut player, |m| matches!(m, ServerMessage::RoomSnapshot(_))).await;
    match msg {
        ServerMessage::RoomSnapshot(update) => {
            assert_eq!(update.snapshot.host_id, player_id);
            assert!(
                update
                    .snapshot
                    .players
                    .iter()
                    .any(|p| p.id == player_id && p.is_host)
            );
        },
        other => panic!("Expected RoomSnapshot, got: {other:?}"),
    }
}

#[tokio::test]
async fn leave_room_broadcasts_player_left() {
    let server = TestServer::new().await;
    let mut host = ws_connect(&server.ws_url()).await;
    let (code, _) = ws_create_room(&mut host, "Alice", None).await;

    let mut player = ws_connect(&server.ws_url()).await;
    let player_id = ws_join_room(&mut player, &code, "Bob").await;

    ws_send(&mut player, &ClientMessage::LeaveRoom).await;

    let msg = ws_recv_until(&mut host, |m| matches!(m, ServerMessage::PlayerLeft(_))).await;
    match msg {
        ServerMessage::PlayerLeft(left) => {
            assert_eq!(left.player_id, player_id);
            assert_eq!(left.player_name, "Bob");
            assert_eq!(left.player_count, 1);
        },
        other => panic!("Expected PlayerLeft, got: {other:?}"),
    }
}
