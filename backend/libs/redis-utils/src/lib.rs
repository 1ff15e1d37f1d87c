use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::Client;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Shared Redis connection manager guarded by a Tokio mutex.
///
/// Every cache and lock component takes this handle instead of opening its
/// own connection; the manager reconnects transparently on broken links.
pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

/// Redis connection pool handle.
pub struct RedisPool {
    manager: SharedConnectionManager,
}

impl RedisPool {
    /// Connect to Redis from a `redis://` URL and wrap the connection
    /// manager in the shared handle.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .context("failed to parse REDIS_URL connection string")?;
        let manager = ConnectionManager::new(client)
            .await
            .context("failed to initialize Redis connection manager")?;
        info!("Redis connection manager initialized");
        Ok(Self {
            manager: Arc::new(Mutex::new(manager)),
        })
    }

    pub fn manager(&self) -> SharedConnectionManager {
        self.manager.clone()
    }
}

/// Round-trip a PING, for startup health checks.
pub async fn ping(manager: &SharedConnectionManager) -> Result<()> {
    let mut conn = manager.lock().await;
    redis::cmd("PING")
        .query_async::<_, String>(&mut *conn)
        .await
        .context("Redis PING failed")?;
    Ok(())
}
