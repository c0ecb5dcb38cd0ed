use serde::Deserialize;
use std::time::Duration;

use pinpoint_core::room::RoomSettings;
use pinpoint_core::scoring::ScoringPolicy;

/// Top-level server configuration, loaded from `pinpoint.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub limits: LimitsConfig,
    pub rooms: RoomsConfig,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            limits: LimitsConfig::default(),
            rooms: RoomsConfig::default(),
            game: GameConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub ws_rate_limit_per_sec: f64,
    pub player_message_buffer: usize,
    /// Maximum size of a single uploaded image, in bytes.
    pub max_image_bytes: usize,
    /// Cap on total bytes held by the in-memory image store.
    pub max_image_store_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            ws_rate_limit_per_sec: 50.0,
            player_message_buffer: 256,
            max_image_bytes: 5 * 1024 * 1024,
            max_image_store_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Room lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub max_players: usize,
    /// Delay between the results of one round and the start of the next.
    pub between_round_secs: u64,
    /// How long a room with no connected players survives before teardown.
    pub abandoned_timeout_secs: u64,
    /// How long a finished room survives after the game ends.
    pub ended_ttl_secs: u64,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            max_players: 20,
            between_round_secs: 5,
            abandoned_timeout_secs: 600,
            ended_ttl_secs: 600,
        }
    }
}

/// Game defaults applied to new rooms unless the host overrides them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub scoring: ScoringPolicy,
    pub view_time_ms: u64,
    pub guess_time_ms: u64,
    pub total_rounds: u32,
    pub min_players: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        let s = RoomSettings::default();
        Self {
            scoring: ScoringPolicy::default(),
            view_time_ms: s.view_time.as_millis() as u64,
            guess_time_ms: s.guess_time.as_millis() as u64,
            total_rounds: s.total_rounds,
            min_players: s.min_players,
        }
    }
}

impl GameConfig {
    /// Room settings derived from the configured defaults.
    pub fn default_settings(&self) -> RoomSettings {
        RoomSettings {
            view_time: Duration::from_millis(self.view_time_ms),
            guess_time: Duration::from_millis(self.guess_time_ms),
            total_rounds: self.total_rounds,
            min_players: self.min_players,
        }
    }
}

impl ServerConfig {
    /// Validate configuration, logging warnings for issues.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }

        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            tracing::error!("limits.ws_rate_limit_per_sec must be > 0");
            std::process::exit(1);
        }
        if self.limits.player_message_buffer == 0 {
            tracing::error!("limits.player_message_buffer must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_image_bytes == 0 {
            tracing::error!("limits.max_image_bytes must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_image_bytes > self.limits.max_image_store_bytes {
            tracing::error!("limits.max_image_bytes exceeds limits.max_image_store_bytes");
            std::process::exit(1);
        }

        if self.rooms.max_players < 2 {
            tracing::error!("rooms.max_players must be >= 2");
            std::process::exit(1);
        }
        if self.rooms.abandoned_timeout_secs == 0 {
            tracing::error!("rooms.abandoned_timeout_secs must be > 0");
            std::process::exit(1);
        }

        if self.game.guess_time_ms == 0 {
            tracing::error!("game.guess_time_ms must be > 0");
            std::process::exit(1);
        }
        if self.game.total_rounds == 0 {
            tracing::error!("game.total_rounds must be > 0");
            std::process::exit(1);
        }
        if self.game.min_players < 2 {
            tracing::warn!(
                min_players = self.game.min_players,
                "game.min_players below 2 makes single-player games possible"
            );
        }
    }

    /// Load config from `pinpoint.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("pinpoint.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from pinpoint.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse pinpoint.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No pinpoint.toml found, using defaults");
                ServerConfig::default()
            },
        };

        // Environment variable overrides
        if let Ok(addr) = std::env::var("PINPOINT_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(val) = std::env::var("PINPOINT_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("PINPOINT_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            config.limits.ws_rate_limit_per_sec = n;
        }
        if let Ok(val) = std::env::var("PINPOINT_MAX_IMAGE_BYTES")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_image_bytes = n;
        }
        if let Ok(val) = std::env::var("PINPOINT_SCORING")
            && let Ok(policy) = toml::Value::String(val).try_into::<ScoringPolicy>()
        {
            config.game.scoring = policy;
        }

        config
    }
}
