/// Configuration management for Leaderboard Service
///
/// Loads configuration from environment variables (and `.env` via dotenvy in `main`).
use anyhow::{anyhow, bail, Context, Result};
use db_pool::DbConfig;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    /// Which durable store backs the service
    pub store: StoreBackend,
    /// Present when `store` is `Postgres`
    pub database: Option<DbConfig>,
    pub redis: RedisConfig,
    pub simulation: SimulationConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("unknown STORE_BACKEND '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// None runs the service against the durable store only
    pub url: Option<String>,
    /// Sorted set holding the ranked index
    pub leaderboard_key: String,
    pub health_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub autostart: bool,
    pub interval: Duration,
    /// Ids are drawn from `1..=user_count`
    pub user_count: i64,
    pub updates_per_tick: usize,
    pub min_rating: i32,
    pub max_rating: i32,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Full rebuild period; None disables the periodic resync
    pub interval: Option<Duration>,
}

/// Two bind parameters per seeded row, under PostgreSQL's 65535 limit
pub const MAX_SEED_BATCH: usize = 32_767;

/// Seed binary settings
#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub user_count: usize,
    pub batch_size: usize,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let app = AppConfig {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 8080),
        };

        let store = match std::env::var("STORE_BACKEND") {
            Ok(value) => value
                .parse::<StoreBackend>()
                .context("Invalid STORE_BACKEND")?,
            Err(_) => StoreBackend::Postgres,
        };

        let database = match store {
            StoreBackend::Postgres => Some(
                DbConfig::from_env("leaderboard-service")
                    .map_err(|e| anyhow!(e))
                    .context("Failed to load database configuration")?,
            ),
            StoreBackend::Memory => None,
        };

        let redis = RedisConfig {
            url: std::env::var("REDIS_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            leaderboard_key: std::env::var("REDIS_LEADERBOARD_KEY")
                .unwrap_or_else(|_| "global_leaderboard".to_string()),
            health_interval: Duration::from_secs(
                env_or("REDIS_HEALTH_INTERVAL_SECS", 15u64).max(1),
            ),
        };

        let simulation = SimulationConfig {
            autostart: env_or("SIMULATION_AUTOSTART", true),
            interval: Duration::from_millis(env_or("SIMULATION_INTERVAL_MS", 500u64).max(1)),
            user_count: env_or("SIMULATION_USER_COUNT", 10_000i64),
            updates_per_tick: env_or("SIMULATION_UPDATES_PER_TICK", 1usize),
            min_rating: env_or("SIMULATION_MIN_RATING", 100i32),
            max_rating: env_or("SIMULATION_MAX_RATING", 5000i32),
        };
        simulation.validate()?;

        let sync_secs: u64 = env_or("SYNC_INTERVAL_SECS", 0);
        let sync = SyncConfig {
            interval: (sync_secs > 0).then(|| Duration::from_secs(sync_secs)),
        };

        Ok(Config {
            app,
            store,
            database,
            redis,
            simulation,
            sync,
        })
    }
}

impl SimulationConfig {
    fn validate(&self) -> Result<()> {
        if self.user_count < 1 {
            bail!("SIMULATION_USER_COUNT must be at least 1");
        }
        if self.min_rating < 0 || self.min_rating > self.max_rating {
            bail!(
                "SIMULATION_MIN_RATING ({}) must be between 0 and SIMULATION_MAX_RATING ({})",
                self.min_rating,
                self.max_rating
            );
        }
        Ok(())
    }
}

impl SeedConfig {
    pub fn from_env() -> Self {
        Self {
            user_count: env_or("SEED_USER_COUNT", 10_000usize),
            batch_size: env_or("SEED_BATCH_SIZE", 500usize).clamp(1, MAX_SEED_BATCH),
        }
    }
}
