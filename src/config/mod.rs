//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (empty = any)
    pub client_origins: Vec<String>,
    /// Simulation tuning
    pub game: GameConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let client_origins = env::var("CLIENT_ORIGIN")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origins,
            game: GameConfig::from_env()?,
        })
    }
}

/// World dimensions. The playable volume is a cuboid centered on the origin.
#[derive(Clone, Debug)]
pub struct WorldConfig {
    /// Edge length of the square world footprint
    pub size: f32,
    /// Distance kept between vehicles and the world edge
    pub boundary_buffer: f32,
    /// Ceiling for vehicle altitude
    pub max_altitude: f32,
    /// Minimum clearance above the terrain surface
    pub min_flight_altitude: f32,
}

impl WorldConfig {
    /// Largest allowed |x| and |z| for a vehicle
    pub fn half_extent(&self) -> f32 {
        self.size / 2.0 - self.boundary_buffer
    }
}

/// Ring around the origin where vehicles (re)spawn
#[derive(Clone, Debug)]
pub struct SpawnConfig {
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_altitude: f32,
    pub max_altitude: f32,
}

/// Billboard count, geometry and placement constraints
#[derive(Clone, Debug)]
pub struct BillboardConfig {
    pub count: usize,
    pub width: f32,
    pub height: f32,
    pub thickness: f32,
    /// Height of the board's lower edge above the terrain
    pub elevation: f32,
    pub max_health: f32,
    pub max_bullet_holes: usize,
    /// Minimum center-to-center distance between billboards
    pub min_spacing: f32,
    /// Maximum terrain height difference across a billboard footprint
    pub max_terrain_variance: f32,
    pub placement_attempts: usize,
    pub debris_count: usize,
}

/// Collision and push-out tuning
#[derive(Clone, Debug)]
pub struct CollisionConfig {
    /// Projectile vs vehicle hit sphere radius (same for every vehicle type)
    pub projectile_hit_radius: f32,
    /// Vehicle bounding sphere used against billboards
    pub vehicle_body_radius: f32,
    /// Extra clearance added when pushing a vehicle out of a billboard
    pub push_out_margin: f32,
    /// Fraction of the inward velocity kept after reflection
    pub restitution: f32,
}

/// Effect sizes and lifetimes
#[derive(Clone, Debug)]
pub struct EffectConfig {
    pub explosion_radius: f32,
    pub explosion_duration_ms: u64,
    pub billboard_explosion_radius: f32,
    pub muzzle_flash_duration_ms: u64,
    pub impact_duration_ms: u64,
}

/// Immutable simulation tuning, read once at startup
#[derive(Clone, Debug)]
pub struct GameConfig {
    pub tick_rate: u32,
    /// Broadcast a snapshot every N ticks
    pub snapshot_interval_ticks: u32,
    /// Upper bound on a single tick's delta time (seconds)
    pub max_tick_delta: f32,
    pub min_players_to_start: usize,
    pub max_players: usize,
    pub respawn_delay_ms: u64,
    /// Velocity multiplier applied every tick
    pub air_resistance: f32,
    pub kill_score: u32,
    pub billboard_score: u32,
    pub seed: u64,
    /// Finite pool of player colors
    pub player_colors: Vec<String>,
    pub world: WorldConfig,
    pub spawn: SpawnConfig,
    pub billboards: BillboardConfig,
    pub collision: CollisionConfig,
    pub effects: EffectConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            snapshot_interval_ticks: 1,
            max_tick_delta: 0.1,
            min_players_to_start: 2,
            max_players: 8,
            respawn_delay_ms: 3000,
            air_resistance: 0.98,
            kill_score: 100,
            billboard_score: 25,
            seed: 0x5EED,
            player_colors: [
                "#ff4136", "#0074d9", "#2ecc40", "#ffdc00", "#b10dc9", "#ff851b", "#39cccc",
                "#f012be",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            world: WorldConfig {
                size: 2000.0,
                boundary_buffer: 50.0,
                max_altitude: 500.0,
                min_flight_altitude: 5.0,
            },
            spawn: SpawnConfig {
                min_distance: 100.0,
                max_distance: 400.0,
                min_altitude: 60.0,
                max_altitude: 150.0,
            },
            billboards: BillboardConfig {
                count: 12,
                width: 40.0,
                height: 20.0,
                thickness: 2.0,
                elevation: 15.0,
                max_health: 200.0,
                max_bullet_holes: 20,
                min_spacing: 150.0,
                max_terrain_variance: 8.0,
                placement_attempts: 600,
                debris_count: 12,
            },
            collision: CollisionConfig {
                projectile_hit_radius: 5.0,
                vehicle_body_radius: 4.0,
                push_out_margin: 0.5,
                restitution: 0.5,
            },
            effects: EffectConfig {
                explosion_radius: 20.0,
                explosion_duration_ms: 1500,
                billboard_explosion_radius: 12.0,
                muzzle_flash_duration_ms: 100,
                impact_duration_ms: 300,
            },
        }
    }
}

impl GameConfig {
    /// Defaults overridden by the game-tuning environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut game = Self::default();
        game.tick_rate = env_or("TICK_RATE", game.tick_rate)?;
        game.min_players_to_start = env_or("MIN_PLAYERS", game.min_players_to_start)?;
        game.max_players = env_or("MAX_PLAYERS", game.max_players)?;
        game.respawn_delay_ms = env_or("RESPAWN_DELAY_MS", game.respawn_delay_ms)?;
        game.world.size = env_or("WORLD_SIZE", game.world.size)?;
        game.billboards.count = env_or("BILLBOARD_COUNT", game.billboards.count)?;
        game.seed = env_or("WORLD_SEED", game.seed)?;

        if game.tick_rate == 0 {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }
        if game.max_players == 0 || game.min_players_to_start > game.max_players {
            return Err(ConfigError::Invalid("MAX_PLAYERS"));
        }
        Ok(game)
    }

    /// Fixed tick interval in microseconds
    pub fn tick_micros(&self) -> u64 {
        1_000_000 / self.tick_rate.max(1) as u64
    }
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
