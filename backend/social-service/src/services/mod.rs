mod comment;
mod favorite;
mod follow;

pub use comment::CommentService;
pub use favorite::FavoriteService;
pub use follow::FollowService;

use dist_lock::LockGuard;
use tracing::warn;

/// Release failures do not fail the operation; the lease expires via TTL.
pub(crate) async fn release_quietly(guard: LockGuard) {
    let key = guard.key().to_string();
    if let Err(err) = guard.release().await {
        warn!(key = %key, error = %err, "lock release failed; lease expires via TTL");
    }
}
