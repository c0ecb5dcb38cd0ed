pub mod net;
pub mod player;
pub mod room;
pub mod scoring;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::player::Player;

    /// Create `n` test players with sequential IDs starting at 1. The first
    /// player is the host.
    pub fn make_players(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| Player::new(i as u64 + 1, format!("Player{}", i + 1), i == 0))
            .collect()
    }
}
