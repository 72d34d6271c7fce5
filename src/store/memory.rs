//! Bounded in-memory backend. Best-effort tracking for a single
//! process; contents are lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::TaskStore;
use crate::error::{TrackerError, TrackerResult};
use crate::models::Task;

pub const DEFAULT_CAPACITY: usize = 1000;

/// Concurrent map of tasks with capacity-based eviction. When a write
/// would exceed the capacity, the record with the smallest `created_at`
/// is dropped first.
pub struct MemoryStore {
    capacity: usize,
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Number of tasks currently resident.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn read_by_id(&self, id: Uuid) -> TrackerResult<Task> {
        self.tasks
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))
    }

    async fn write(&self, task: &Task) -> TrackerResult<()> {
        let mut tasks = self.tasks.write().await;
        if !tasks.contains_key(&task.id) && tasks.len() >= self.capacity {
            // Evict the single oldest record to make room.
            let oldest = tasks
                .values()
                .min_by_key(|t| t.created_at)
                .map(|t| t.id);
            if let Some(id) = oldest {
                log::debug!("memory store at capacity, evicting task {id}");
                tasks.remove(&id);
            }
        }
        tasks.insert(task.id, task.clone());
        Ok(())
    }
}
