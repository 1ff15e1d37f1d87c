//! Unified cache key schema
//!
//! All crates must use these key generators to ensure consistency.
//! Key format: v{VERSION}:{entity}:{qualifier}:{identifier}

use uuid::Uuid;

/// Cache schema version - increment when changing key formats
pub const CACHE_VERSION: u32 = 1;

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    // ============= User Keys =============

    /// User by ID
    /// Format: v1:user:id:{user_id}
    pub fn user(user_id: Uuid) -> String {
        format!("v{}:user:id:{}", CACHE_VERSION, user_id)
    }

    /// User by username
    /// Format: v1:user:username:{username}
    pub fn user_by_username(username: &str) -> String {
        format!("v{}:user:username:{}", CACHE_VERSION, username)
    }

    // ============= Video Keys =============

    /// Video metadata
    /// Format: v1:video:id:{video_id}
    pub fn video(video_id: Uuid) -> String {
        format!("v{}:video:id:{}", CACHE_VERSION, video_id)
    }

    // ============= Social Keys =============

    /// Follow relation for an ordered pair
    /// Format: v1:relation:pair:{follower_id}:{followee_id}
    pub fn relation(follower_id: Uuid, followee_id: Uuid) -> String {
        format!(
            "v{}:relation:pair:{}:{}",
            CACHE_VERSION, follower_id, followee_id
        )
    }

    /// Favorite marker for a (user, video) pair
    /// Format: v1:favorite:pair:{user_id}:{video_id}
    pub fn favorite(user_id: Uuid, video_id: Uuid) -> String {
        format!(
            "v{}:favorite:pair:{}:{}",
            CACHE_VERSION, user_id, video_id
        )
    }

    // ============= Lock Keys =============

    /// Lease key for a multi-store relation invariant. The pair is ordered
    /// so both directions of a relation contend on one lease.
    pub fn relation_lock(a: Uuid, b: Uuid) -> String {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        format!("v{}:lock:relation:{}:{}", CACHE_VERSION, lo, hi)
    }

    /// Lease key for a favorite invariant.
    pub fn favorite_lock(user_id: Uuid, video_id: Uuid) -> String {
        format!(
            "v{}:lock:favorite:{}:{}",
            CACHE_VERSION, user_id, video_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_lock_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(CacheKey::relation_lock(a, b), CacheKey::relation_lock(b, a));
    }

    #[test]
    fn keys_carry_schema_version_and_entity() {
        let id = Uuid::new_v4();
        let key = CacheKey::user(id);
        assert!(key.starts_with(&format!("v{}:user:", CACHE_VERSION)));
        assert!(key.ends_with(&id.to_string()));
    }
}
