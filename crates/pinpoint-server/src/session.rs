use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use pinpoint_core::net::messages::{
    ClientMessage, ErrorKind, ErrorMsg, GameEndedMsg, GameResumedMsg, GameStartedMsg, HideImageMsg,
    ImageUploadedMsg, KickedMsg, LeaderboardUpdateMsg, PlayerJoinedMsg, PlayerLeftMsg,
    PlayerScoredMsg, RoomClosedMsg, RoomCreatedMsg, RoomJoinedMsg, RoomSnapshotMsg,
    RoomSnapshotUpdateMsg, RoundEndedMsg, ServerMessage, ShowImageMsg, TargetCalibratedMsg,
};
use pinpoint_core::net::protocol::encode_server_message;
use pinpoint_core::player::{ConnectionId, Player};
use pinpoint_core::room::{Phase, RoomSettings, leaderboard};
use pinpoint_core::scoring::{Position, ScoringPolicy, score};
use pinpoint_core::time::unix_millis_now;

use crate::config::RoomsConfig;
use crate::image_store::MemoryImageStore;
use crate::room_manager::PlayerSender;
use crate::state::SharedRoomManager;

/// Maximum player display name length.
const MAX_NAME_LEN: usize = 32;

/// Commands delivered to a room session's mailbox. All room state mutation
/// happens inside the session task, in mailbox order.
pub enum RoomCommand {
    Join {
        conn_id: ConnectionId,
        name: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), ErrorMsg>>,
    },
    Client {
        conn_id: ConnectionId,
        msg: ClientMessage,
    },
    Disconnect {
        conn_id: ConnectionId,
    },
}

/// Shared handles a session needs beyond its own state.
#[derive(Clone)]
pub struct SessionContext {
    pub rooms: SharedRoomManager,
    pub images: Arc<MemoryImageStore>,
    pub rooms_cfg: RoomsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    ViewingOver,
    GuessingOver,
    NextRound,
    GameOver,
}

struct PhaseTimer {
    deadline: Instant,
    kind: TimerKind,
}

#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Spawn the session task for a new room. The host is seated immediately;
/// a RoomCreated message is pushed to their channel before any command is
/// processed.
pub fn spawn_room_session(
    code: String,
    host_id: ConnectionId,
    host_name: String,
    host_sender: PlayerSender,
    settings: RoomSettings,
    scoring: ScoringPolicy,
    ctx: SessionContext,
) -> (mpsc::UnboundedSender<RoomCommand>, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let mut senders = std::collections::HashMap::new();
    senders.insert(host_id, host_sender);
    let session = RoomSession {
        code,
        ctx,
        settings,
        scoring,
        phase: Phase::Lobby,
        paused_from: None,
        round: 0,
        host_id,
        players: vec![Player::new(host_id, host_name, true)],
        senders,
        image_id: None,
        target: None,
        round_started_ms: 0,
        clicks: HashSet::new(),
        timer: None,
        teardown_at: None,
    };
    let handle = tokio::spawn(session.run(cmd_rx));
    (cmd_tx, handle)
}

struct RoomSession {
    code: String,
    ctx: SessionContext,
    settings: RoomSettings,
    scoring: ScoringPolicy,
    phase: Phase,
    /// Phase the room was in when the host paused. Resume restarts that
    /// phase's timer from the beginning.
    paused_from: Option<Phase>,
    round: u32,
    host_id: ConnectionId,
    players: Vec<Player>,
    senders: std::collections::HashMap<ConnectionId, PlayerSender>,
    image_id: Option<String>,
    target: Option<Position>,
    /// Wall-clock start of the current round's viewing phase. Diagnostic.
    round_started_ms: u64,
    /// Connections that have clicked this round.
    clicks: HashSet<ConnectionId>,
    timer: Option<PhaseTimer>,
    teardown_at: Option<Instant>,
}

impl RoomSession {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<RoomCommand>) {
        self.send_to(
            self.host_id,
            &ServerMessage::RoomCreated(RoomCreatedMsg {
                room_code: self.code.clone(),
                player_id: self.host_id,
                snapshot: self.snapshot(),
            }),
        );
        tracing::info!(room = %self.code, host_id = self.host_id, "Room created");

        loop {
            let deadline = self.next_deadline();
            let sleep_target =
                deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if self.handle_command(cmd).await == Flow::Stop {
                                break;
                            }
                        },
                        None => break,
                    }
                }
                _ = tokio::time::sleep_until(sleep_target), if deadline.is_some() => {
                    if self.on_deadline().await == Flow::Stop {
                        break;
                    }
                }
            }
        }

        self.teardown().await;
    }

    /// Earliest pending deadline: the phase timer or the abandoned-room
    /// teardown, whichever is sooner.
    fn next_deadline(&self) -> Option<Instant> {
        match (self.timer.as_ref().map(|t| t.deadline), self.teardown_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        }
    }

    async fn on_deadline(&mut self) -> Flow {
        let now = Instant::now();

        if let Some(at) = self.teardown_at
            && at <= now
        {
            tracing::info!(room = %self.code, "Room expired, tearing down");
            return Flow::Stop;
        }

        let Some(timer) = self.timer.take() else {
            return Flow::Continue;
        };
        if timer.deadline > now {
            // Woke up for the teardown check; re-arm the phase timer.
            self.timer = Some(timer);
            return Flow::Continue;
        }

        match timer.kind {
            TimerKind::ViewingOver => self.enter_guessing(),
            TimerKind::GuessingOver => self.enter_results().await,
            TimerKind::NextRound => self.start_round(self.round + 1).await,
            TimerKind::GameOver => self.end_game(),
        }
        Flow::Continue
    }

    async fn handle_command(&mut self, cmd: RoomCommand) -> Flow {
        match cmd {
            RoomCommand::Join {
                conn_id,
                name,
                sender,
                reply,
            } => {
                let result = self.handle_join(conn_id, name, sender).await;
                let _ = reply.send(result);
                Flow::Continue
            },
            RoomCommand::Client { conn_id, msg } => self.handle_client(conn_id, msg).await,
            RoomCommand::Disconnect { conn_id } => self.handle_disconnect(conn_id).await,
        }
    }

    async fn handle_join(
        &mut self,
        conn_id: ConnectionId,
        name: String,
        sender: PlayerSender,
    ) -> Result<(), ErrorMsg> {
        let name = name.trim().to_string();
        if name.is_empty() || name.len() > MAX_NAME_LEN || name.chars().any(|c| c.is_control()) {
            return Err(ErrorMsg {
                kind: ErrorKind::Validation,
                message: "invalid player name".to_string(),
            });
        }
        if self.phase == Phase::Ended {
            return Err(ErrorMsg {
                kind: ErrorKind::Precondition,
                message: "game has ended".to_string(),
            });
        }
        if self.players.iter().filter(|p| p.connected).count() >= self.ctx.rooms_cfg.max_players {
            return Err(ErrorMsg {
                kind: ErrorKind::Precondition,
                message: "room is full".to_string(),
            });
        }

        // A join matching a disconnected roster entry is a rejoin: the entry
        // is reactivated under the new connection id with its score intact.
        let rejoin_idx = self
            .players
            .iter()
            .position(|p| !p.connected && p.display_name == name);
        let player = match rejoin_idx {
            Some(i) => {
                let old_id = self.players[i].id;
                self.players[i].id = conn_id;
                self.players[i].connected = true;
                if self.clicks.remove(&old_id) {
                    self.clicks.insert(conn_id);
                }
                if old_id == self.host_id {
                    self.host_id = conn_id;
                }
                self.players[i].clone()
            },
            None => {
                let player = Player::new(conn_id, name, false);
                self.players.push(player.clone());
                player
            },
        };
        self.senders.insert(conn_id, sender);
        self.teardown_at = None;
        {
            let mut mgr = self.ctx.rooms.write().await;
            mgr.bind_connection(conn_id, &self.code);
        }

        self.send_to(
            conn_id,
            &ServerMessage::RoomJoined(RoomJoinedMsg {
                room_code: self.code.clone(),
                player_id: conn_id,
                snapshot: self.snapshot(),
            }),
        );
        self.broadcast_except(
            conn_id,
            &ServerMessage::PlayerJoined(PlayerJoinedMsg {
                player,
                player_count: self.connected_count() as u32,
            }),
        );
        // A room whose host seat is held by a disconnected player gets a
        // new host from the connected roster.
        if !self
            .players
            .iter()
            .any(|p| p.id == self.host_id && p.connected)
        {
            self.migrate_host();
        }
        self.push_host_snapshot();
        tracing::info!(room = %self.code, conn_id, "Player joined");
        Ok(())
    }

    async fn handle_client(&mut self, conn_id: ConnectionId, msg: ClientMessage) -> Flow {
        if !self.senders.contains_key(&conn_id) {
            // Kicked or already removed; drop silently.
            return Flow::Continue;
        }
        match msg {
            ClientMessage::UploadImage(m) => self.handle_upload(conn_id, m.data, m.content_type).await,
            ClientMessage::CalibrateTarget(m) => self.handle_calibrate(conn_id, m.position),
            ClientMessage::StartGame(m) => {
                self.handle_start(conn_id, m.settings.map(Into::into)).await
            },
            ClientMessage::PlayerClick(m) => self.handle_click(conn_id, m.position),
            ClientMessage::PauseGame => self.handle_pause(conn_id),
            ClientMessage::ResumeGame => self.handle_resume(conn_id),
            ClientMessage::NextRound => return self.handle_next_round(conn_id).await,
            ClientMessage::EndGame => self.handle_end_game(conn_id).await,
            ClientMessage::KickPlayer(m) => self.handle_kick(conn_id, m.player_id).await,
            ClientMessage::CloseRoom => return self.handle_close(conn_id),
            ClientMessage::LeaveRoom => return self.handle_disconnect(conn_id).await,
            ClientMessage::CreateRoom(_) | ClientMessage::JoinRoom(_) => {
                self.send_error(conn_id, ErrorKind::Validation, "already in a room");
            },
        }
        Flow::Continue
    }

    async fn handle_upload(&mut self, conn_id: ConnectionId, data: Vec<u8>, content_type: String) {
        if !self.require_host(conn_id) {
            return;
        }
        if self.phase != Phase::Lobby {
            self.send_error(
                conn_id,
                ErrorKind::Precondition,
                "images can only be uploaded in the lobby",
            );
            return;
        }
        // Replace any previous upload.
        if let Some(old) = self.image_id.take() {
            self.ctx.images.remove(&old).await;
        }
        match self.ctx.images.insert(data, &content_type).await {
            Ok(id) => {
                let url = MemoryImageStore::url_for(&id);
                self.image_id = Some(id);
                // A new image invalidates the old target.
                self.target = None;
                self.broadcast(&ServerMessage::ImageUploaded(ImageUploadedMsg {
                    image_url: url,
                }));
                tracing::info!(room = %self.code, "Image uploaded");
            },
            Err(e) => {
                self.send_error(conn_id, ErrorKind::Validation, &e.to_string());
            },
        }
    }

    fn handle_calibrate(&mut self, conn_id: ConnectionId, position: Position) {
        if !self.require_host(conn_id) {
            return;
        }
        if self.phase != Phase::Lobby {
            self.send_error(
                conn_id,
                ErrorKind::Precondition,
                "target can only be calibrated in the lobby",
            );
            return;
        }
        if self.image_id.is_none() {
            self.send_error(conn_id, ErrorKind::Precondition, "upload an image first");
            return;
        }
        if !position.x.is_finite() || !position.y.is_finite() {
            self.send_error(conn_id, ErrorKind::Validation, "target position must be finite");
            return;
        }
        self.target = Some(position);
        self.broadcast(&ServerMessage::TargetCalibrated(TargetCalibratedMsg {
            position,
        }));
    }

    async fn handle_start(&mut self, conn_id: ConnectionId, settings: Option<RoomSettings>) {
        if !self.require_host(conn_id) {
            return;
        }
        if self.phase != Phase::Lobby {
            self.send_error(conn_id, ErrorKind::Precondition, "game already in progress");
            return;
        }
        if self.image_id.is_none() || self.target.is_none() {
            self.send_error(
                conn_id,
                ErrorKind::Precondition,
                "image and target must be set before starting",
            );
            return;
        }
        if let Some(s) = settings {
            if s.total_rounds == 0 || s.guess_time.is_zero() {
                self.send_error(conn_id, ErrorKind::Validation, "invalid settings");
                return;
            }
            self.settings = s;
        }
        if self.connected_count() < self.settings.min_players {
            self.send_error(
                conn_id,
                ErrorKind::Precondition,
                &format!("need at least {} players", self.settings.min_players),
            );
            return;
        }

        for p in &mut self.players {
            p.score = 0;
        }
        self.broadcast(&ServerMessage::GameStarted(GameStartedMsg {
            snapshot: self.snapshot(),
        }));
        tracing::info!(room = %self.code, rounds = self.settings.total_rounds, "Game started");
        self.start_round(1).await;
    }

    fn handle_click(&mut self, conn_id: ConnectionId, position: Position) {
        if self.phase != Phase::Guessing {
            self.send_error(conn_id, ErrorKind::Precondition, "not accepting guesses");
            return;
        }
        if !position.x.is_finite() || !position.y.is_finite() {
            self.send_error(conn_id, ErrorKind::Validation, "click position must be finite");
            return;
        }
        if self.clicks.contains(&conn_id) {
            self.send_error(conn_id, ErrorKind::Conflict, "already guessed this round");
            return;
        }
        let Some(target) = self.target else {
            tracing::warn!(room = %self.code, "Guessing phase with no target");
            return;
        };

        let points = score(self.scoring, position, target);
        self.clicks.insert(conn_id);
        let Some(player) = self.players.iter_mut().find(|p| p.id == conn_id) else {
            return;
        };
        player.score += points;
        let scored = PlayerScoredMsg {
            player_id: conn_id,
            player_name: player.display_name.clone(),
            points,
            position,
            total_score: player.score,
        };
        self.broadcast(&ServerMessage::PlayerScored(scored));
        self.broadcast(&ServerMessage::LeaderboardUpdate(LeaderboardUpdateMsg {
            leaderboard: leaderboard(&self.players),
        }));
        self.push_host_snapshot();
    }

    fn handle_pause(&mut self, conn_id: ConnectionId) {
        if !self.require_host(conn_id) {
            return;
        }
        if !matches!(self.phase, Phase::Viewing | Phase::Guessing | Phase::Results) {
            self.send_error(conn_id, ErrorKind::Precondition, "nothing to pause");
            return;
        }
        self.paused_from = Some(self.phase);
        self.phase = Phase::Paused;
        self.timer = None;
        self.broadcast(&ServerMessage::GamePaused);
        tracing::info!(room = %self.code, "Game paused");
    }

    fn handle_resume(&mut self, conn_id: ConnectionId) {
        if !self.require_host(conn_id) {
            return;
        }
        if self.phase != Phase::Paused {
            self.send_error(conn_id, ErrorKind::Precondition, "game is not paused");
            return;
        }
        let Some(prev) = self.paused_from.take() else {
            self.send_error(conn_id, ErrorKind::Precondition, "game is not paused");
            return;
        };
        self.phase = prev;
        // The interrupted phase gets its full duration again.
        let duration = match prev {
            Phase::Viewing => Some((TimerKind::ViewingOver, self.settings.view_time)),
            Phase::Guessing => Some((TimerKind::GuessingOver, self.settings.guess_time)),
            Phase::Results => Some((
                self.results_timer_kind(),
                Duration::from_secs(self.ctx.rooms_cfg.between_round_secs),
            )),
            _ => None,
        };
        if let Some((kind, d)) = duration {
            self.arm_timer(kind, d);
        }
        self.broadcast(&ServerMessage::GameResumed(GameResumedMsg { phase: prev }));
        tracing::info!(room = %self.code, phase = ?prev, "Game resumed");
    }

    async fn handle_next_round(&mut self, conn_id: ConnectionId) -> Flow {
        if !self.require_host(conn_id) {
            return Flow::Continue;
        }
        if self.phase != Phase::Results {
            self.send_error(conn_id, ErrorKind::Precondition, "no round to advance");
            return Flow::Continue;
        }
        if self.round >= self.settings.total_rounds {
            self.end_game();
        } else {
            self.start_round(self.round + 1).await;
        }
        Flow::Continue
    }

    async fn handle_end_game(&mut self, conn_id: ConnectionId) {
        if !self.require_host(conn_id) {
            return;
        }
        if !matches!(
            self.phase,
            Phase::Viewing | Phase::Guessing | Phase::Results | Phase::Paused
        ) {
            self.send_error(conn_id, ErrorKind::Precondition, "no game in progress");
            return;
        }
        self.end_game();
    }

    async fn handle_kick(&mut self, conn_id: ConnectionId, target_id: ConnectionId) {
        if !self.require_host(conn_id) {
            return;
        }
        if target_id == self.host_id {
            self.send_error(conn_id, ErrorKind::Validation, "cannot kick the host");
            return;
        }
        if !self.players.iter().any(|p| p.id == target_id) {
            self.send_error(conn_id, ErrorKind::NotFound, "no such player");
            return;
        }

        self.send_to(
            target_id,
            &ServerMessage::Kicked(KickedMsg {
                message: "removed by the host".to_string(),
            }),
        );
        let name = self.remove_player(target_id).await;
        self.broadcast(&ServerMessage::PlayerLeft(PlayerLeftMsg {
            player_id: target_id,
            player_name: name,
            player_count: self.connected_count() as u32,
        }));
        self.push_host_snapshot();
        tracing::info!(room = %self.code, target_id, "Player kicked");
    }

    fn handle_close(&mut self, conn_id: ConnectionId) -> Flow {
        if !self.require_host(conn_id) {
            return Flow::Continue;
        }
        self.broadcast(&ServerMessage::RoomClosed(RoomClosedMsg {
            message: "room closed by the host".to_string(),
        }));
        tracing::info!(room = %self.code, "Room closed by host");
        Flow::Stop
    }

    async fn handle_disconnect(&mut self, conn_id: ConnectionId) -> Flow {
        if self.senders.remove(&conn_id).is_none() {
            return Flow::Continue;
        }
        {
            let mut mgr = self.ctx.rooms.write().await;
            mgr.unbind_connection(conn_id);
        }

        // Roster entries survive disconnects so rejoins and final
        // leaderboards keep their scores; removal is kick or teardown only.
        let name = match self.players.iter_mut().find(|p| p.id == conn_id) {
            Some(p) => {
                p.connected = false;
                p.display_name.clone()
            },
            None => String::new(),
        };

        self.broadcast(&ServerMessage::PlayerLeft(PlayerLeftMsg {
            player_id: conn_id,
            player_name: name,
            player_count: self.connected_count() as u32,
        }));
        tracing::info!(room = %self.code, conn_id, "Player left");

        if conn_id == self.host_id {
            self.migrate_host();
        }

        if self.connected_count() == 0 {
            self.teardown_at = Some(
                Instant::now() + Duration::from_secs(self.ctx.rooms_cfg.abandoned_timeout_secs),
            );
        } else {
            self.push_host_snapshot();
        }
        Flow::Continue
    }

    /// Promote the earliest-joined connected player to host.
    fn migrate_host(&mut self) {
        let Some(new_host) = self.players.iter().find(|p| p.connected).map(|p| p.id) else {
            return;
        };
        self.host_id = new_host;
        for p in &mut self.players {
            p.is_host = p.id == new_host;
        }
        self.send_to(
            new_host,
            &ServerMessage::RoomSnapshot(RoomSnapshotUpdateMsg {
                snapshot: self.snapshot(),
            }),
        );
        tracing::info!(room = %self.code, new_host, "Host migrated");
    }

    async fn start_round(&mut self, round: u32) {
        let (image_url, target) = match (&self.image_id, self.target) {
            (Some(id), Some(t)) => (MemoryImageStore::url_for(id), t),
            _ => {
                tracing::warn!(room = %self.code, "Cannot start round without image and target");
                return;
            },
        };
        self.round = round;
        self.clicks.clear();
        self.phase = Phase::Viewing;
        self.round_started_ms = unix_millis_now();
        self.broadcast(&ServerMessage::ShowImage(ShowImageMsg {
            round,
            image_url,
            target,
            view_time_ms: self.settings.view_time.as_millis() as u64,
        }));
        let view_time = self.settings.view_time;
        self.arm_timer(TimerKind::ViewingOver, view_time);
        tracing::debug!(
            room = %self.code, round, started_ms = self.round_started_ms,
            "Round started"
        );
    }

    fn enter_guessing(&mut self) {
        self.phase = Phase::Guessing;
        self.broadcast(&ServerMessage::HideImage(HideImageMsg {
            guess_time_ms: self.settings.guess_time.as_millis() as u64,
        }));
        let guess_time = self.settings.guess_time;
        self.arm_timer(TimerKind::GuessingOver, guess_time);
    }

    async fn enter_results(&mut self) {
        let Some(target) = self.target else {
            return;
        };
        self.phase = Phase::Results;
        self.timer = None;
        self.broadcast(&ServerMessage::RoundEnded(RoundEndedMsg {
            round: self.round,
            leaderboard: leaderboard(&self.players),
            correct_position: target,
        }));
        tracing::debug!(room = %self.code, round = self.round, "Round ended");

        // The final reveal gets the same delay before the game closes out.
        self.arm_timer(
            self.results_timer_kind(),
            Duration::from_secs(self.ctx.rooms_cfg.between_round_secs),
        );
    }

    fn results_timer_kind(&self) -> TimerKind {
        if self.round >= self.settings.total_rounds {
            TimerKind::GameOver
        } else {
            TimerKind::NextRound
        }
    }

    fn end_game(&mut self) {
        self.phase = Phase::Ended;
        self.timer = None;
        self.paused_from = None;
        let board = leaderboard(&self.players);
        let winner = board.first().cloned();
        self.broadcast(&ServerMessage::GameEnded(GameEndedMsg {
            final_leaderboard: board,
            winner,
        }));
        // The room lingers so players can review the final board.
        self.teardown_at =
            Some(Instant::now() + Duration::from_secs(self.ctx.rooms_cfg.ended_ttl_secs));
        tracing::info!(room = %self.code, "Game ended");
    }

    async fn teardown(&mut self) {
        if let Some(id) = self.image_id.take() {
            self.ctx.images.remove(&id).await;
        }
        let conn_ids: Vec<ConnectionId> = self.senders.keys().copied().collect();
        let mut mgr = self.ctx.rooms.write().await;
        for id in conn_ids {
            mgr.unbind_connection(id);
        }
        mgr.remove_room(&self.code);
        tracing::info!(room = %self.code, "Room torn down");
    }

    // -- helpers ----------------------------------------------------------

    fn arm_timer(&mut self, kind: TimerKind, after: Duration) {
        self.timer = Some(PhaseTimer {
            deadline: Instant::now() + after,
            kind,
        });
    }

    fn connected_count(&self) -> usize {
        self.players.iter().filter(|p| p.connected).count()
    }

    fn require_host(&mut self, conn_id: ConnectionId) -> bool {
        if conn_id == self.host_id {
            true
        } else {
            self.send_error(conn_id, ErrorKind::Unauthorized, "host only");
            false
        }
    }

    fn snapshot(&self) -> RoomSnapshotMsg {
        RoomSnapshotMsg {
            room_code: self.code.clone(),
            phase: self.phase,
            current_round: self.round,
            host_id: self.host_id,
            settings: self.settings.clone().into(),
            players: self.players.clone(),
            image_url: self.image_id.as_deref().map(MemoryImageStore::url_for),
            target: self.target,
        }
    }

    fn push_host_snapshot(&self) {
        self.send_to(
            self.host_id,
            &ServerMessage::RoomSnapshot(RoomSnapshotUpdateMsg {
                snapshot: self.snapshot(),
            }),
        );
    }

    fn send_error(&self, conn_id: ConnectionId, kind: ErrorKind, message: &str) {
        self.send_to(
            conn_id,
            &ServerMessage::Error(ErrorMsg {
                kind,
                message: message.to_string(),
            }),
        );
    }

    fn send_to(&self, conn_id: ConnectionId, msg: &ServerMessage) {
        let Some(sender) = self.senders.get(&conn_id) else {
            return;
        };
        match encode_server_message(msg) {
            Ok(data) => {
                if let Err(e) = sender.try_send(Bytes::from(data)) {
                    tracing::debug!(
                        conn_id, room = %self.code, error = %e,
                        "Failed to send to player (slow or disconnected)"
                    );
                }
            },
            Err(e) => tracing::error!(room = %self.code, error = %e, "Failed to encode message"),
        }
    }

    fn broadcast(&self, msg: &ServerMessage) {
        match encode_server_message(msg) {
            Ok(data) => {
                let bytes = Bytes::from(data);
                for (&conn_id, sender) in &self.senders {
                    if let Err(e) = sender.try_send(bytes.clone()) {
                        tracing::debug!(
                            conn_id, room = %self.code, error = %e,
                            "Skipping broadcast to slow client"
                        );
                    }
                }
            },
            Err(e) => tracing::error!(room = %self.code, error = %e, "Failed to encode broadcast"),
        }
    }

    fn broadcast_except(&self, exclude: ConnectionId, msg: &ServerMessage) {
        match encode_server_message(msg) {
            Ok(data) => {
                let bytes = Bytes::from(data);
                for (&conn_id, sender) in &self.senders {
                    if conn_id != exclude
                        && let Err(e) = sender.try_send(bytes.clone())
                    {
                        tracing::debug!(
                            conn_id, room = %self.code, error = %e,
                            "Skipping broadcast to slow client"
                        );
                    }
                }
            },
            Err(e) => tracing::error!(room = %self.code, error = %e, "Failed to encode broadcast"),
        }
    }

    /// Remove a player entirely (kick path), returning their display name.
    async fn remove_player(&mut self, conn_id: ConnectionId) -> String {
        self.senders.remove(&conn_id);
        self.clicks.remove(&conn_id);
        {
            let mut mgr = self.ctx.rooms.write().await;
            mgr.unbind_connection(conn_id);
        }
        let name = self
            .players
            .iter()
            .find(|p| p.id == conn_id)
            .map(|p| p.display_name.clone())
            .unwrap_or_default();
        self.players.retain(|p| p.id != conn_id);
        name
    }
}
