//! Configuration for the user domain crate
//!
//! Settings come from environment variables with development fallbacks
//! from a `.env` file; construction is explicit at the composition root,
//! nothing is read from global state afterwards.

use db_pool::DbConfig;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DbConfig,
    pub redis_url: String,
    pub cache_ttl: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, String> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
        }

        let database = DbConfig::from_env("user-service")?;
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let cache_ttl = env::var("USER_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(clip_cache::ttl::USER);

        Ok(Self {
            database,
            redis_url,
            cache_ttl,
        })
    }
}
