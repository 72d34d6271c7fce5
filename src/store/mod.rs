//! Storage backends for tasks.
//!
//! Every backend satisfies the same two-method contract: `read_by_id`
//! maps its native "missing" condition to [`TrackerError::NotFound`],
//! and `write` is a blind full-record upsert. Callers are expected to
//! keep a single writer per task id; no optimistic concurrency is
//! layered on top.

pub mod cache;
pub mod memory;
pub mod postgres;
pub mod redb;
pub mod redis;

pub use cache::{Cache, CacheStore, LruMemoryCache};
pub use memory::MemoryStore;
pub use postgres::{PgTaskStore, build_pool};
pub use redb::RedbStore;
pub use redis::RedisTaskStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::TrackerResult;
use crate::models::Task;

/// Uniform read/write contract over task identity.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Fetch a task by id. Fails with `NotFound` when no record exists.
    async fn read_by_id(&self, id: Uuid) -> TrackerResult<Task>;

    /// Persist a task, replacing any prior record with the same id.
    async fn write(&self, task: &Task) -> TrackerResult<()>;
}
