use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::player::{ConnectionId, Player};

/// Characters used in generated room codes.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of generated room codes.
pub const CODE_LEN: usize = 6;

/// Settings for one room, fixed at creation and optionally overridden by
/// the host when starting the game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    pub view_time: Duration,
    pub guess_time: Duration,
    pub total_rounds: u32,
    pub min_players: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            view_time: Duration::from_secs(3),
            guess_time: Duration::from_secs(20),
            total_rounds: 10,
            min_players: 2,
        }
    }
}

/// The room's current stage in the round lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Lobby,
    Viewing,
    Guessing,
    Results,
    Ended,
    Paused,
}

/// One row of a computed leaderboard: connected players ranked descending
/// by score, ties broken by join order, rank 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub name: String,
    pub score: i32,
    pub id: ConnectionId,
}

/// Compute the leaderboard from a roster. Only connected players are
/// ranked; the sort is stable so equal scores keep join order.
pub fn leaderboard(players: &[Player]) -> Vec<LeaderboardEntry> {
    let mut ranked: Vec<&Player> = players.iter().filter(|p| p.connected).collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
        .iter()
        .enumerate()
        .map(|(i, p)| LeaderboardEntry {
            rank: i as u32 + 1,
            name: p.display_name.clone(),
            score: p.score,
            id: p.id,
        })
        .collect()
}

/// Generate a random 6-character room code. Uniqueness against live rooms
/// is the registry's job; at 36^6 codes, retry-on-collision terminates.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| {
            let idx = rand::Rng::random_range(&mut rng, 0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Validate a room code: 4-10 uppercase alphanumeric characters. Generated
/// codes are always 6; explicitly supplied codes get the wider range.
pub fn is_valid_room_code(code: &str) -> bool {
    (4..=10).contains(&code.len())
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}
