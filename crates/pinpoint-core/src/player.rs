use serde::{Deserialize, Serialize};

/// Transient identifier assigned to each WebSocket connection. Acts as the
/// player's identity for the lifetime of the session; not a durable account.
pub type ConnectionId = u64;

/// A player in a Pinpoint room roster.
///
/// Disconnected players stay in the roster with `connected = false` so
/// final leaderboards remain meaningful; they are removed physically only
/// on an explicit kick or room teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: ConnectionId,
    pub display_name: String,
    /// Cumulative score. Negative values are possible under the grid
    /// scoring policy.
    pub score: i32,
    pub is_host: bool,
    pub connected: bool,
}

impl Player {
    pub fn new(id: ConnectionId, display_name: String, is_host: bool) -> Self {
        Self {
            id,
            display_name,
            score: 0,
            is_host,
            connected: true,
        }
    }
}
