use serde::{Deserialize, Serialize};

use super::messages::{
    CalibrateTargetMsg, ClientMessage, CreateRoomMsg, ErrorMsg, GameEndedMsg, GameResumedMsg,
    GameStartedMsg, HideImageMsg, ImageUploadedMsg, JoinRoomMsg, KickPlayerMsg, KickedMsg,
    LeaderboardUpdateMsg, MessageType, PlayerClickMsg, PlayerJoinedMsg, PlayerLeftMsg,
    PlayerScoredMsg, RoomClosedMsg, RoomCreatedMsg, RoomJoinedMsg, RoomSnapshotUpdateMsg,
    RoundEndedMsg, ServerMessage, ShowImageMsg, StartGameMsg, TargetCalibratedMsg,
    UploadImageMsg,
};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum payload size for ordinary messages.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

/// Maximum payload size for image-bearing messages (uploads and room
/// snapshots that embed an image URL stay small; only UploadImage carries
/// raw bytes).
pub const MAX_IMAGE_MESSAGE_SIZE: usize = 6 * 1024 * 1024; // 6 MiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => write!(f, "payload too large: {size} bytes"),
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Size cap for a frame of the given type.
pub fn max_size_for(msg_type: MessageType) -> usize {
    match msg_type {
        MessageType::UploadImage => MAX_IMAGE_MESSAGE_SIZE,
        _ => MAX_MESSAGE_SIZE,
    }
}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > max_size_for(msg_type) {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::CreateRoom(m) => encode_message(MessageType::CreateRoom, m),
        ClientMessage::JoinRoom(m) => encode_message(MessageType::JoinRoom, m),
        ClientMessage::LeaveRoom => encode_message(MessageType::LeaveRoom, &()),
        ClientMessage::UploadImage(m) => encode_message(MessageType::UploadImage, m),
        ClientMessage::CalibrateTarget(m) => encode_message(MessageType::CalibrateTarget, m),
        ClientMessage::StartGame(m) => encode_message(MessageType::StartGame, m),
        ClientMessage::PlayerClick(m) => encode_message(MessageType::PlayerClick, m),
        ClientMessage::PauseGame => encode_message(MessageType::PauseGame, &()),
        ClientMessage::ResumeGame => encode_message(MessageType::ResumeGame, &()),
        ClientMessage::NextRound => encode_message(MessageType::NextRound, &()),
        ClientMessage::EndGame => encode_message(MessageType::EndGame, &()),
        ClientMessage::KickPlayer(m) => encode_message(MessageType::KickPlayer, m),
        ClientMessage::CloseRoom => encode_message(MessageType::CloseRoom, &()),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::RoomCreated(m) => encode_message(MessageType::RoomCreated, m),
        ServerMessage::RoomJoined(m) => encode_message(MessageType::RoomJoined, m),
        ServerMessage::PlayerJoined(m) => encode_message(MessageType::PlayerJoined, m),
        ServerMessage::PlayerLeft(m) => encode_message(MessageType::PlayerLeft, m),
        ServerMessage::ImageUploaded(m) => encode_message(MessageType::ImageUploaded, m),
        ServerMessage::TargetCalibrated(m) => encode_message(MessageType::TargetCalibrated, m),
        ServerMessage::GameStarted(m) => encode_message(MessageType::GameStarted, m),
        ServerMessage::ShowImage(m) => encode_message(MessageType::ShowImage, m),
        ServerMessage::HideImage(m) => encode_message(MessageType::HideImage, m),
        ServerMessage::PlayerScored(m) => encode_message(MessageType::PlayerScored, m),
        ServerMessage::LeaderboardUpdate(m) => encode_message(MessageType::LeaderboardUpdate, m),
        ServerMessage::RoundEnded(m) => encode_message(MessageType::RoundEnded, m),
        ServerMessage::GameEnded(m) => encode_message(MessageType::GameEnded, m),
        ServerMessage::GamePaused => encode_message(MessageType::GamePaused, &()),
        ServerMessage::GameResumed(m) => encode_message(MessageType::GameResumed, m),
        ServerMessage::Kicked(m) => encode_message(MessageType::Kicked, m),
        ServerMessage::RoomClosed(m) => encode_message(MessageType::RoomClosed, m),
        ServerMessage::RoomSnapshot(m) => encode_message(MessageType::RoomSnapshot, m),
        ServerMessage::Error(m) => encode_message(MessageType::Error, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    Ok(match msg_type {
        MessageType::CreateRoom => {
            ClientMessage::CreateRoom(decode_payload::<CreateRoomMsg>(data)?)
        },
        MessageType::JoinRoom => ClientMessage::JoinRoom(decode_payload::<JoinRoomMsg>(data)?),
        MessageType::LeaveRoom => ClientMessage::LeaveRoom,
        MessageType::UploadImage => {
            ClientMessage::UploadImage(decode_payload::<UploadImageMsg>(data)?)
        },
        MessageType::CalibrateTarget => {
            ClientMessage::CalibrateTarget(decode_payload::<CalibrateTargetMsg>(data)?)
        },
        MessageType::StartGame => ClientMessage::StartGame(decode_payload::<StartGameMsg>(data)?),
        MessageType::PlayerClick => {
            ClientMessage::PlayerClick(decode_payload::<PlayerClickMsg>(data)?)
        },
        MessageType::PauseGame => ClientMessage::PauseGame,
        MessageType::ResumeGame => ClientMessage::ResumeGame,
        MessageType::NextRound => ClientMessage::NextRound,
        MessageType::EndGame => ClientMessage::EndGame,
        MessageType::KickPlayer => {
            ClientMessage::KickPlayer(decode_payload::<KickPlayerMsg>(data)?)
        },
        MessageType::CloseRoom => ClientMessage::CloseRoom,
        _ => return Err(ProtocolError::UnknownMessageType(data[0])),
    })
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    Ok(match msg_type {
        MessageType::RoomCreated => {
            ServerMessage::RoomCreated(decode_payload::<RoomCreatedMsg>(data)?)
        },
        MessageType::RoomJoined => {
            ServerMessage::RoomJoined(decode_payload::<RoomJoinedMsg>(data)?)
        },
        MessageType::PlayerJoined => {
            ServerMessage::PlayerJoined(decode_payload::<PlayerJoinedMsg>(data)?)
        },
        MessageType::PlayerLeft => {
            ServerMessage::PlayerLeft(decode_payload::<PlayerLeftMsg>(data)?)
        },
        MessageType::ImageUploaded => {
            ServerMessage::ImageUploaded(decode_payload::<ImageUploadedMsg>(data)?)
        },
        MessageType::TargetCalibrated => {
            ServerMessage::TargetCalibrated(decode_payload::<TargetCalibratedMsg>(data)?)
        },
        MessageType::GameStarted => {
            ServerMessage::GameStarted(decode_payload::<GameStartedMsg>(data)?)
        },
        MessageType::ShowImage => ServerMessage::ShowImage(decode_payload::<ShowImageMsg>(data)?),
        MessageType::HideImage => ServerMessage::HideImage(decode_payload::<HideImageMsg>(data)?),
        MessageType::PlayerScored => {
            ServerMessage::PlayerScored(decode_payload::<PlayerScoredMsg>(data)?)
        },
        MessageType::LeaderboardUpdate => {
            ServerMessage::LeaderboardUpdate(decode_payload::<LeaderboardUpdateMsg>(data)?)
        },
        MessageType::RoundEnded => {
            ServerMessage::RoundEnded(decode_payload::<RoundEndedMsg>(data)?)
        },
        MessageType::GameEnded => ServerMessage::GameEnded(decode_payload::<GameEndedMsg>(data)?),
        MessageType::GamePaused => ServerMessage::GamePaused,
        MessageType::GameResumed => {
            ServerMessage::GameResumed(decode_payload::<GameResumedMsg>(data)?)
        },
        MessageType::Kicked => ServerMessage::Kicked(decode_payload::<KickedMsg>(data)?),
        MessageType::RoomClosed => {
            ServerMessage::RoomClosed(decode_payload::<RoomClosedMsg>(data)?)
        },
        MessageType::RoomSnapshot => {
            ServerMessage::RoomSnapshot(decode_payload::<RoomSnapshotUpdateMsg>(data)?)
        },
        MessageType::Error => ServerMessage::Error(decode_payload::<ErrorMsg>(data)?),
        _ => return Err(ProtocolError::UnknownMessageType(data[0])),
    })
}
