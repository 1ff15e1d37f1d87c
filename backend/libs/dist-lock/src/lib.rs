//! Lease-based distributed mutual exclusion
//!
//! A lock is a lease: a key held by one session token with a TTL. If the
//! holder crashes without releasing, the lease expires and the lock
//! becomes acquirable again, bounding worst-case unavailability to the
//! TTL. Used only for invariants that span more than one entity-store
//! transaction; single-aggregate mutations rely on the row lock inside
//! `update_with_lock`.

mod memory;
mod redis_backend;

pub use memory::MemoryLockBackend;
pub use redis_backend::RedisLockBackend;

use async_trait::async_trait;
use error_types::{LockError, LockResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;
use uuid::Uuid;

/// Coordination-service operations a lease lock needs. Any backend with
/// atomic check-and-set plus fenced delete satisfies this.
#[async_trait]
pub trait LockBackend: Send + Sync {
    /// Attempt to take the lease for `holder`. Returns `false` when
    /// another session holds an unexpired lease.
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> LockResult<bool>;

    /// Release the lease if `holder` still owns it. Returns `false` when
    /// the lease had already expired or changed hands.
    async fn release(&self, key: &str, holder: &str) -> LockResult<bool>;
}

/// Lock acquisition tuning, carried in service configuration.
#[derive(Clone, Debug)]
pub struct LockConfig {
    /// Lease time-to-live; upper bound on unavailability after a crash.
    pub ttl: Duration,
    /// How long a blocking acquire may wait before `Timeout`.
    pub wait: Duration,
    /// Poll interval between acquisition attempts.
    pub retry_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10),
            wait: Duration::from_secs(5),
            retry_interval: Duration::from_millis(50),
        }
    }
}

/// Handle to the coordination service, shared by all lock users.
#[derive(Clone)]
pub struct LockManager {
    backend: Arc<dyn LockBackend>,
    config: LockConfig,
}

impl LockManager {
    pub fn new(backend: Arc<dyn LockBackend>, config: LockConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Non-blocking acquisition. `AlreadyHeld` when the lease is taken.
    pub async fn try_acquire(&self, key: &str) -> LockResult<LockGuard> {
        let holder = Uuid::new_v4().to_string();
        if self
            .backend
            .try_acquire(key, &holder, self.config.ttl)
            .await?
        {
            debug!(key = %key, "lock acquired");
            Ok(LockGuard::new(Arc::clone(&self.backend), key, holder))
        } else {
            Err(LockError::AlreadyHeld)
        }
    }

    /// Blocking acquisition bounded by the configured wait. Polls the
    /// lease until it is granted or the bound elapses with `Timeout`.
    /// A caller that drops this future holds nothing; a caller that
    /// abandons the returned guard leaves the lease to expire via TTL.
    pub async fn acquire(&self, key: &str) -> LockResult<LockGuard> {
        let deadline = Instant::now() + self.config.wait;
        let holder = Uuid::new_v4().to_string();

        loop {
            if self
                .backend
                .try_acquire(key, &holder, self.config.ttl)
                .await?
            {
                debug!(key = %key, "lock acquired");
                return Ok(LockGuard::new(Arc::clone(&self.backend), key, holder));
            }
            if Instant::now() + self.config.retry_interval >= deadline {
                debug!(key = %key, "lock acquisition timed out");
                return Err(LockError::Timeout);
            }
            sleep(self.config.retry_interval).await;
        }
    }
}

/// An exclusively held lease. Release consumes the guard, so it can be
/// released at most once; a dropped guard relies on TTL expiry.
pub struct LockGuard {
    backend: Arc<dyn LockBackend>,
    key: String,
    holder: String,
    released: bool,
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.key)
            .field("holder", &self.holder)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl LockGuard {
    fn new(backend: Arc<dyn LockBackend>, key: &str, holder: String) -> Self {
        Self {
            backend,
            key: key.to_string(),
            holder,
            released: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release the lease. Returns `Ok` even when the lease had already
    /// expired; the fenced delete never frees another session's lease.
    pub async fn release(mut self) -> LockResult<()> {
        self.released = true;
        let freed = self.backend.release(&self.key, &self.holder).await?;
        if freed {
            debug!(key = %self.key, "lock released");
        } else {
            debug!(key = %self.key, "lease already expired at release");
        }
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            debug!(key = %self.key, "lock guard dropped without release; lease expires via TTL");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use error_types::LockError;

    fn manager(config: LockConfig) -> LockManager {
        LockManager::new(Arc::new(MemoryLockBackend::new()), config)
    }

    #[tokio::test]
    async fn second_session_is_excluded_while_lease_held() {
        let manager = manager(LockConfig::default());
        let guard = manager.try_acquire("lock:pair").await.unwrap();

        let err = manager.try_acquire("lock:pair").await.unwrap_err();
        assert!(matches!(err, LockError::AlreadyHeld));

        guard.release().await.unwrap();
        let second = manager.try_acquire("lock:pair").await.unwrap();
        second.release().await.unwrap();
    }

    #[tokio::test]
    async fn blocking_acquire_waits_for_release() {
        let manager = manager(LockConfig {
            ttl: Duration::from_secs(10),
            wait: Duration::from_secs(1),
            retry_interval: Duration::from_millis(10),
        });
        let guard = manager.try_acquire("lock:pair").await.unwrap();

        let contender = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.acquire("lock:pair").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        guard.release().await.unwrap();

        let second = contender.await.unwrap().unwrap();
        second.release().await.unwrap();
    }

    #[tokio::test]
    async fn crashed_holder_frees_lease_after_ttl() {
        let ttl = Duration::from_millis(80);
        let manager = manager(LockConfig {
            ttl,
            wait: Duration::from_millis(500),
            retry_interval: Duration::from_millis(10),
        });

        // Simulate a crash: take the lease and drop the guard unreleased.
        let guard = manager.try_acquire("lock:pair").await.unwrap();
        drop(guard);

        let started = Instant::now();
        let second = manager.acquire("lock:pair").await.unwrap();
        let waited = started.elapsed();
        assert!(waited <= ttl + Duration::from_millis(100));
        second.release().await.unwrap();
    }

    #[tokio::test]
    async fn bounded_wait_surfaces_timeout() {
        let manager = manager(LockConfig {
            ttl: Duration::from_secs(10),
            wait: Duration::from_millis(100),
            retry_interval: Duration::from_millis(10),
        });
        let _guard = manager.try_acquire("lock:pair").await.unwrap();

        let err = manager.acquire("lock:pair").await.unwrap_err();
        assert!(matches!(err, LockError::Timeout));
    }

    #[tokio::test]
    async fn release_is_fenced_to_the_holding_session() {
        let backend = Arc::new(MemoryLockBackend::new());
        let manager = LockManager::new(backend.clone(), LockConfig::default());

        let guard = manager.try_acquire("lock:pair").await.unwrap();
        // A stranger's release attempt must not free the lease.
        assert!(!backend.release("lock:pair", "other-session").await.unwrap());
        let err = manager.try_acquire("lock:pair").await.unwrap_err();
        assert!(matches!(err, LockError::AlreadyHeld));
        guard.release().await.unwrap();
    }
}
