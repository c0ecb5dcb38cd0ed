use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::player::{ConnectionId, Player};
use crate::room::{LeaderboardEntry, Phase, RoomSettings};
use crate::scoring::Position;

/// Network message type discriminator. One byte on the wire, ahead of the
/// MessagePack payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    CreateRoom = 0x01,
    JoinRoom = 0x02,
    LeaveRoom = 0x03,
    UploadImage = 0x04,
    CalibrateTarget = 0x05,
    StartGame = 0x06,
    PlayerClick = 0x07,
    PauseGame = 0x08,
    ResumeGame = 0x09,
    NextRound = 0x0A,
    EndGame = 0x0B,
    KickPlayer = 0x0C,
    CloseRoom = 0x0D,

    // Server -> Client
    RoomCreated = 0x10,
    RoomJoined = 0x11,
    PlayerJoined = 0x12,
    PlayerLeft = 0x13,
    ImageUploaded = 0x14,
    TargetCalibrated = 0x15,
    GameStarted = 0x16,
    ShowImage = 0x17,
    HideImage = 0x18,
    PlayerScored = 0x19,
    LeaderboardUpdate = 0x1A,
    RoundEnded = 0x1B,
    GameEnded = 0x1C,
    GamePaused = 0x1D,
    GameResumed = 0x1E,
    Kicked = 0x1F,
    RoomClosed = 0x20,
    RoomSnapshot = 0x21,
    Error = 0x22,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0x01 => Self::CreateRoom,
            0x02 => Self::JoinRoom,
            0x03 => Self::LeaveRoom,
            0x04 => Self::UploadImage,
            0x05 => Self::CalibrateTarget,
            0x06 => Self::StartGame,
            0x07 => Self::PlayerClick,
            0x08 => Self::PauseGame,
            0x09 => Self::ResumeGame,
            0x0A => Self::NextRound,
            0x0B => Self::EndGame,
            0x0C => Self::KickPlayer,
            0x0D => Self::CloseRoom,
            0x10 => Self::RoomCreated,
            0x11 => Self::RoomJoined,
            0x12 => Self::PlayerJoined,
            0x13 => Self::PlayerLeft,
            0x14 => Self::ImageUploaded,
            0x15 => Self::TargetCalibrated,
            0x16 => Self::GameStarted,
            0x17 => Self::ShowImage,
            0x18 => Self::HideImage,
            0x19 => Self::PlayerScored,
            0x1A => Self::LeaderboardUpdate,
            0x1B => Self::RoundEnded,
            0x1C => Self::GameEnded,
            0x1D => Self::GamePaused,
            0x1E => Self::GameResumed,
            0x1F => Self::Kicked,
            0x20 => Self::RoomClosed,
            0x21 => Self::RoomSnapshot,
            0x22 => Self::Error,
            _ => return None,
        })
    }
}

/// Room settings on the wire, in milliseconds so browser clients never see
/// the internal Duration encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsMsg {
    pub view_time_ms: u64,
    pub guess_time_ms: u64,
    pub total_rounds: u32,
    pub min_players: u32,
}

impl From<RoomSettings> for SettingsMsg {
    fn from(s: RoomSettings) -> Self {
        Self {
            view_time_ms: s.view_time.as_millis() as u64,
            guess_time_ms: s.guess_time.as_millis() as u64,
            total_rounds: s.total_rounds,
            min_players: s.min_players as u32,
        }
    }
}

impl From<SettingsMsg> for RoomSettings {
    fn from(m: SettingsMsg) -> Self {
        Self {
            view_time: Duration::from_millis(m.view_time_ms),
            guess_time: Duration::from_millis(m.guess_time_ms),
            total_rounds: m.total_rounds,
            min_players: m.min_players as usize,
        }
    }
}

/// Full room state, enough for a client to render from scratch. Clients
/// must tolerate a snapshot replace, not just deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshotMsg {
    pub room_code: String,
    pub phase: Phase,
    pub current_round: u32,
    pub host_id: ConnectionId,
    pub settings: SettingsMsg,
    pub players: Vec<Player>,
    pub image_url: Option<String>,
    pub target: Option<Position>,
}

/// Command error taxonomy. Delivered to the originating connection only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Unauthorized,
    Conflict,
    Precondition,
}

// ---------------------------------------------------------------------------
// Client -> Server payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRoomMsg {
    /// Explicit room code (admin flow). Empty string means "generate one".
    pub room_code: String,
    pub player_name: String,
    pub settings: Option<SettingsMsg>,
    pub protocol_version: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRoomMsg {
    pub room_code: String,
    pub player_name: String,
    pub protocol_version: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadImageMsg {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrateTargetMsg {
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartGameMsg {
    pub settings: Option<SettingsMsg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerClickMsg {
    pub position: Position,
    /// Client wall-clock milliseconds; diagnostic only.
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KickPlayerMsg {
    pub player_id: ConnectionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    CreateRoom(CreateRoomMsg),
    JoinRoom(JoinRoomMsg),
    LeaveRoom,
    UploadImage(UploadImageMsg),
    CalibrateTarget(CalibrateTargetMsg),
    StartGame(StartGameMsg),
    PlayerClick(PlayerClickMsg),
    PauseGame,
    ResumeGame,
    NextRound,
    EndGame,
    KickPlayer(KickPlayerMsg),
    CloseRoom,
}

impl ClientMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::CreateRoom(_) => MessageType::CreateRoom,
            Self::JoinRoom(_) => MessageType::JoinRoom,
            Self::LeaveRoom => MessageType::LeaveRoom,
            Self::UploadImage(_) => MessageType::UploadImage,
            Self::CalibrateTarget(_) => MessageType::CalibrateTarget,
            Self::StartGame(_) => MessageType::StartGame,
            Self::PlayerClick(_) => MessageType::PlayerClick,
            Self::PauseGame => MessageType::PauseGame,
            Self::ResumeGame => MessageType::ResumeGame,
            Self::NextRound => MessageType::NextRound,
            Self::EndGame => MessageType::EndGame,
            Self::KickPlayer(_) => MessageType::KickPlayer,
            Self::CloseRoom => MessageType::CloseRoom,
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> Client payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomCreatedMsg {
    pub room_code: String,
    pub player_id: ConnectionId,
    pub snapshot: RoomSnapshotMsg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomJoinedMsg {
    pub room_code: String,
    pub player_id: ConnectionId,
    pub snapshot: RoomSnapshotMsg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerJoinedMsg {
    pub player: Player,
    pub player_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLeftMsg {
    pub player_id: ConnectionId,
    pub player_name: String,
    pub player_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUploadedMsg {
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCalibratedMsg {
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStartedMsg {
    pub snapshot: RoomSnapshotMsg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowImageMsg {
    pub round: u32,
    pub image_url: String,
    pub target: Position,
    pub view_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HideImageMsg {
    pub guess_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerScoredMsg {
    pub player_id: ConnectionId,
    pub player_name: String,
    pub points: i32,
    pub position: Position,
    pub total_score: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardUpdateMsg {
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundEndedMsg {
    pub round: u32,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub correct_position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEndedMsg {
    pub final_leaderboard: Vec<LeaderboardEntry>,
    pub winner: Option<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResumedMsg {
    pub phase: Phase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KickedMsg {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomClosedMsg {
    pub message: String,
}

/// Host-observer update: full room snapshot pushed to the host connection
/// on roster and score changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshotUpdateMsg {
    pub snapshot: RoomSnapshotMsg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMsg {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    RoomCreated(RoomCreatedMsg),
    RoomJoined(RoomJoinedMsg),
    PlayerJoined(PlayerJoinedMsg),
    PlayerLeft(PlayerLeftMsg),
    ImageUploaded(ImageUploadedMsg),
    TargetCalibrated(TargetCalibratedMsg),
    GameStarted(GameStartedMsg),
    ShowImage(ShowImageMsg),
    HideImage(HideImageMsg),
    PlayerScored(PlayerScoredMsg),
    LeaderboardUpdate(LeaderboardUpdateMsg),
    RoundEnded(RoundEndedMsg),
    GameEnded(GameEndedMsg),
    GamePaused,
    GameResumed(GameResumedMsg),
    Kicked(KickedMsg),
    RoomClosed(RoomClosedMsg),
    RoomSnapshot(RoomSnapshotUpdateMsg),
    Error(ErrorMsg),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::RoomCreated(_) => MessageType::RoomCreated,
            Self::RoomJoined(_) => MessageType::RoomJoined,
            Self::PlayerJoined(_) => MessageType::PlayerJoined,
            Self::PlayerLeft(_) => MessageType::PlayerLeft,
            Self::ImageUploaded(_) => MessageType::ImageUploaded,
            Self::TargetCalibrated(_) => MessageType::TargetCalibrated,
            Self::GameStarted(_) => MessageType::GameStarted,
            Self::ShowImage(_) => MessageType::ShowImage,
            Self::HideImage(_) => MessageType::HideImage,
            Self::PlayerScored(_) => MessageType::PlayerScored,
            Self::LeaderboardUpdate(_) => MessageType::LeaderboardUpdate,
            Self::RoundEnded(_) => MessageType::RoundEnded,
            Self::GameEnded(_) => MessageType::GameEnded,
            Self::GamePaused => MessageType::GamePaused,
            Self::GameResumed(_) => MessageType::GameResumed,
            Self::Kicked(_) => MessageType::Kicked,
            Self::RoomClosed(_) => MessageType::RoomClosed,
            Self::RoomSnapshot(_) => MessageType::RoomSnapshot,
            Self::Error(_) => MessageType::Error,
        }
    }
}
