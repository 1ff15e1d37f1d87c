use db_pool::DbConfig;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DbConfig,
    pub redis_url: String,
    pub cache_ttl: Duration,
    /// Page size served by the feed query.
    pub feed_page_size: i64,
}

impl Settings {
    pub fn from_env() -> Result<Self, String> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
        }

        let database = DbConfig::from_env("video-service")?;
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let cache_ttl = env::var("VIDEO_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(clip_cache::ttl::VIDEO);
        let feed_page_size = env::var("FEED_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            database,
            redis_url,
            cache_ttl,
            feed_page_size,
        })
    }
}
