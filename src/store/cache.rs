//! Cache-backed ephemeral store.
//!
//! Wraps any read/write byte cache under a `tasks.<id>` key. Eviction
//! and TTL policy belong to the cache itself; a miss simply maps to
//! `NotFound`.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::TaskStore;
use crate::error::{TrackerError, TrackerResult};
use crate::models::Task;

/// Minimal read/write cache over opaque bytes.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, key: &str, value: Vec<u8>);
}

/// In-process LRU cache, usable as the default [`Cache`] implementation.
pub struct LruMemoryCache {
    inner: Mutex<LruCache<String, Vec<u8>>>,
}

impl LruMemoryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }
}

#[async_trait]
impl Cache for LruMemoryCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: Vec<u8>) {
        self.inner.lock().await.put(key.to_string(), value);
    }
}

/// Task store delegating persistence to a [`Cache`].
pub struct CacheStore {
    cache: Arc<dyn Cache>,
}

impl CacheStore {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    fn key(id: Uuid) -> String {
        format!("tasks.{id}")
    }
}

#[async_trait]
impl TaskStore for CacheStore {
    async fn read_by_id(&self, id: Uuid) -> TrackerResult<Task> {
        let raw = self
            .cache
            .get(&Self::key(id))
            .await
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn write(&self, task: &Task) -> TrackerResult<()> {
        let bytes = serde_json::to_vec(task)?;
        self.cache.set(&Self::key(task.id), bytes).await;
        Ok(())
    }
}
