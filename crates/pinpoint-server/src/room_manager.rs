use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use pinpoint_core::net::messages::{ErrorKind, ErrorMsg};
use pinpoint_core::player::ConnectionId;
use pinpoint_core::room::{RoomSettings, generate_room_code, is_valid_room_code};
use pinpoint_core::scoring::ScoringPolicy;

use crate::session::{RoomCommand, SessionContext, spawn_room_session};

/// Per-player sender for outbound WebSocket binary messages.
/// Bounded to prevent memory exhaustion from slow clients.
/// Uses `Bytes` for zero-copy cloning when broadcasting to multiple players.
pub type PlayerSender = mpsc::Sender<Bytes>;

/// Mailbox handle for a room session task.
pub type SessionSender = mpsc::UnboundedSender<RoomCommand>;

struct RoomEntry {
    session_tx: SessionSender,
    #[allow(dead_code)]
    task: JoinHandle<()>,
}

/// Routing registry for active rooms. Room state lives inside each session
/// task; the manager only maps room codes to mailboxes and connections to
/// rooms.
pub struct RoomManager {
    rooms: HashMap<String, RoomEntry>,
    connections: HashMap<ConnectionId, String>,
    next_connection_id: ConnectionId,
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
            connections: HashMap::new(),
            next_connection_id: 1,
        }
    }

    pub fn alloc_connection_id(&mut self) -> ConnectionId {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        id
    }

    /// Create a new room and spawn its session task. An empty
    /// `explicit_code` means "generate one". Returns the room code and the
    /// host's connection id.
    pub fn create_room(
        &mut self,
        explicit_code: &str,
        host_name: String,
        settings: RoomSettings,
        scoring: ScoringPolicy,
        sender: PlayerSender,
        ctx: SessionContext,
    ) -> Result<(String, ConnectionId), ErrorMsg> {
        let code = if explicit_code.is_empty() {
            generate_unique_room_code(&self.rooms)
        } else {
            if !is_valid_room_code(explicit_code) {
                return Err(ErrorMsg {
                    kind: ErrorKind::Validation,
                    message: "invalid room code".to_string(),
                });
            }
            if self.rooms.contains_key(explicit_code) {
                return Err(ErrorMsg {
                    kind: ErrorKind::Conflict,
                    message: "room code already in use".to_string(),
                });
            }
            explicit_code.to_string()
        };

        let host_id = self.alloc_connection_id();
        let (session_tx, task) = spawn_room_session(
            code.clone(),
            host_id,
            host_name,
            sender,
            settings,
            scoring,
            ctx,
        );
        self.rooms.insert(code.clone(), RoomEntry { session_tx, task });
        self.connections.insert(host_id, code.clone());
        Ok((code, host_id))
    }

    /// Mailbox for an existing room.
    pub fn session(&self, room_code: &str) -> Option<SessionSender> {
        self.rooms.get(room_code).map(|e| e.session_tx.clone())
    }

    pub fn bind_connection(&mut self, conn_id: ConnectionId, room_code: &str) {
        self.connections.insert(conn_id, room_code.to_string());
    }

    pub fn unbind_connection(&mut self, conn_id: ConnectionId) {
        self.connections.remove(&conn_id);
    }

    /// Drop a room's routing entry. Called by the session during teardown.
    pub fn remove_room(&mut self, room_code: &str) {
        self.rooms.remove(room_code);
        self.connections.retain(|_, code| code != room_code);
    }

    /// (active rooms, joined connections) for the health endpoint.
    pub fn stats(&self) -> (usize, usize) {
        (self.rooms.len(), self.connections.len())
    }

    #[cfg(test)]
    pub fn room_exists(&self, room_code: &str) -> bool {
        self.rooms.contains_key(room_code)
    }
}

/// Generate a unique room code, retrying on collision with existing rooms.
fn generate_unique_room_code(existing: &HashMap<String, RoomEntry>) -> String {
    loop {
        let code = generate_room_code();
        if !existing.contains_key(&code) {
            return code;
        }
    }
}
