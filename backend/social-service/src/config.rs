//! Configuration for the social domain crate

use db_pool::DbConfig;
use dist_lock::LockConfig;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DbConfig,
    pub redis_url: String,
    pub lock: LockConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self, String> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
        }

        let database = DbConfig::from_env("social-service")?;
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let defaults = LockConfig::default();
        let lock = LockConfig {
            ttl: env_duration_secs("LOCK_TTL_SECS", defaults.ttl),
            wait: env_duration_millis("LOCK_WAIT_MS", defaults.wait),
            retry_interval: env_duration_millis("LOCK_RETRY_MS", defaults.retry_interval),
        };

        Ok(Self {
            database,
            redis_url,
            lock,
        })
    }
}

fn env_duration_secs(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_duration_millis(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
