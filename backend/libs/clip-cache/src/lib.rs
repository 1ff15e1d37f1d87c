//! Clipstream cache-aside layer
//!
//! Wraps any [`entity_store::EntityStore`] with a Redis-backed read path:
//! - reads check the cache first and fall through to the store on miss,
//!   populating the cache with a TTL before returning
//! - every successful durable write deletes the affected keys as a set,
//!   strictly after commit
//! - any cache failure degrades to the wrapped store (fail-open); the
//!   caller never observes a cache error
//! - unified key schema with versioning, metrics integration

mod backend;
mod error;
mod keys;
mod memory;
mod metrics;
mod store;

pub use backend::{CacheBackend, RedisBackend};
pub use error::{CacheError, CacheResult};
pub use keys::{CacheKey, CACHE_VERSION};
pub use memory::MemoryBackend;
pub use metrics::CacheMetrics;
pub use store::{CachedStore, Cacheable};

use std::time::Duration;

/// Default TTL values (seconds)
pub mod ttl {
    use std::time::Duration;

    pub const USER: Duration = Duration::from_secs(3600); // 1 hour
    pub const VIDEO: Duration = Duration::from_secs(3600); // 1 hour
    pub const RELATION: Duration = Duration::from_secs(1800); // 30 minutes
    pub const FAVORITE: Duration = Duration::from_secs(1800); // 30 minutes
}

/// Add up to 10% jitter to a TTL to prevent thundering herd expiry.
pub(crate) fn add_jitter(ttl: Duration) -> Duration {
    let jitter_percent = (rand::random::<u32>() % 10) as f64 / 100.0;
    let jitter = ttl.as_secs_f64() * jitter_percent;
    ttl + Duration::from_secs_f64(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_jitter() {
        let ttl = Duration::from_secs(300);
        let with_jitter = add_jitter(ttl);
        // Jitter should be 0-10% of TTL
        assert!(with_jitter >= ttl);
        assert!(with_jitter <= ttl + ttl / 10);
    }
}
