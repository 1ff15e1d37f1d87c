//! In-memory entity store
//!
//! Backs tests and local development. Mutations run under a store-wide
//! async mutex held across the `mutate` closure, which gives the same
//! per-key serializability guarantee as the Postgres row lock (every
//! `mutate` sees the previously committed state).

use crate::{Entity, EntityStore, MutateFn};
use async_trait::async_trait;
use error_types::{StoreError, StoreResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Hook assigning an identity to a freshly inserted entity.
/// Receives the entity and a store-unique sequence number.
pub type AssignFn<E> = fn(E, u64) -> E;

/// Uniqueness predicate between a candidate and an already stored entity.
pub type ConflictFn<E> = fn(&E, &E) -> bool;

pub struct MemoryStore<E: Entity> {
    rows: Arc<Mutex<Vec<E>>>,
    seq: Arc<AtomicU64>,
    assign: AssignFn<E>,
    conflict: ConflictFn<E>,
}

impl<E: Entity> MemoryStore<E> {
    pub fn new() -> Self {
        Self::with_hooks(|entity, _| entity, |_, _| false)
    }

    /// Build a store with an ID-assignment hook and a uniqueness predicate,
    /// mirroring what the schema would enforce in Postgres.
    pub fn with_hooks(assign: AssignFn<E>, conflict: ConflictFn<E>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(Vec::new())),
            seq: Arc::new(AtomicU64::new(1)),
            assign,
            conflict,
        }
    }

    /// Snapshot of every stored entity, for assertions in tests.
    pub async fn dump(&self) -> Vec<E> {
        self.rows.lock().await.clone()
    }
}

impl<E: Entity> Default for MemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Clone for MemoryStore<E> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            seq: Arc::clone(&self.seq),
            assign: self.assign,
            conflict: self.conflict,
        }
    }
}

#[async_trait]
impl<E: Entity> EntityStore<E> for MemoryStore<E> {
    async fn get(&self, key: &E::Key) -> StoreResult<E> {
        let rows = self.rows.lock().await;
        rows.iter()
            .find(|row| row.matches(key))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create(&self, entity: E) -> StoreResult<E> {
        let mut rows = self.rows.lock().await;
        let entity = (self.assign)(entity, self.seq.fetch_add(1, Ordering::SeqCst));
        if rows.iter().any(|row| (self.conflict)(&entity, row)) {
            return Err(StoreError::Conflict("duplicate entity".into()));
        }
        rows.push(entity.clone());
        Ok(entity)
    }

    async fn update_with_lock(&self, key: &E::Key, mutate: MutateFn<E>) -> StoreResult<E> {
        // The mutex is held across `mutate`: no two mutations for any key
        // ever observe the same committed state.
        let mut rows = self.rows.lock().await;
        let idx = rows
            .iter()
            .position(|row| row.matches(key))
            .ok_or(StoreError::NotFound)?;
        let updated = mutate(rows[idx].clone())?;
        rows[idx] = updated.clone();
        Ok(updated)
    }
}
