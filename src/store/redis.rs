//! Durable external key-value backend (Redis).
//!
//! One record per task under a shared bucket prefix. No TTL is applied
//! here; retention belongs to the Redis deployment's own configuration.

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Pool, Runtime};
use uuid::Uuid;

use super::TaskStore;
use crate::error::{TrackerError, TrackerResult};
use crate::models::Task;

pub const DEFAULT_BUCKET: &str = "tasks";

pub struct RedisTaskStore {
    pool: Pool,
    bucket: String,
}

impl RedisTaskStore {
    /// Build a pooled client for `url` (e.g. `redis://127.0.0.1:6379`).
    pub fn connect(url: &str, bucket: &str) -> TrackerResult<Self> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| TrackerError::Pool(e.to_string()))?;
        Ok(Self {
            pool,
            bucket: bucket.to_string(),
        })
    }

    fn key(&self, id: Uuid) -> String {
        format!("{}:{}", self.bucket, id)
    }
}

#[async_trait]
impl TaskStore for RedisTaskStore {
    async fn read_by_id(&self, id: Uuid) -> TrackerResult<Task> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| TrackerError::Pool(e.to_string()))?;
        let raw: Option<Vec<u8>> = conn
            .get(self.key(id))
            .await
            .map_err(|e| TrackerError::Storage(e.to_string()))?;
        let raw = raw.ok_or_else(|| TrackerError::NotFound(id.to_string()))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn write(&self, task: &Task) -> TrackerResult<()> {
        let bytes = serde_json::to_vec(task)?;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| TrackerError::Pool(e.to_string()))?;
        let _: () = conn
            .set(self.key(task.id), bytes)
            .await
            .map_err(|e| TrackerError::Storage(e.to_string()))?;
        Ok(())
    }
}
