//! Entity store contract
//!
//! Every aggregate (user, video, relation, favorite, comment) is persisted
//! through the same three-operation interface. Reads are plain point
//! lookups; all mutation after creation goes through `update_with_lock`,
//! which serializes concurrent writers on the same key behind the backing
//! store's row lock.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use error_types::{StoreError, StoreResult};
use std::fmt::Debug;

/// An aggregate identified by a stable key.
///
/// `matches` is the key-addressing predicate; a key may have more than one
/// form (by-ID, by-username) and an entity answers to all of them.
pub trait Entity: Clone + Send + Sync + 'static {
    type Key: Clone + Debug + Send + Sync + 'static;

    fn matches(&self, key: &Self::Key) -> bool;
}

/// Caller-supplied mutation applied to a locked snapshot.
///
/// Must be pure with respect to the store: it sees the committed state
/// under lock and returns the replacement state, or an error to abort the
/// transaction with no write.
pub type MutateFn<E> = Box<dyn FnOnce(E) -> Result<E, StoreError> + Send>;

/// The persistence contract for one entity type.
#[async_trait]
pub trait EntityStore<E: Entity>: Send + Sync {
    /// Point lookup without locking. `NotFound` if the key is absent.
    async fn get(&self, key: &E::Key) -> StoreResult<E>;

    /// Insert a new entity, returning it with its assigned identity.
    /// `Conflict` if a uniqueness constraint is violated.
    async fn create(&self, entity: E) -> StoreResult<E>;

    /// The only sanctioned mutation path.
    ///
    /// Opens a transaction, reads the row under an exclusive lock
    /// (blocking other `update_with_lock` calls on the same key until the
    /// transaction ends), hands the locked snapshot to `mutate`, persists
    /// the result and commits. Any error from `mutate` or the store rolls
    /// back with no partial write. Returns the committed entity.
    async fn update_with_lock(&self, key: &E::Key, mutate: MutateFn<E>) -> StoreResult<E>;
}
