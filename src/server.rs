//! The task server: owns a store, drives the task state machine and
//! publishes change notifications.
//!
//! The server is the sole writer per task id. Writes are blind
//! full-record upserts, so a failed call leaves no partial state.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{TrackerError, TrackerResult};
use crate::models::{Task, TaskModel, parse_resource_path};
use crate::store::TaskStore;

/// Buffered change notifications per subscriber before lagging.
const EVENT_CAPACITY: usize = 64;

/// A change notification: which fields of the wire model differ from
/// the previous snapshot. Cleared fields appear as JSON `null`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskChange {
    pub resource: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

pub struct TaskServer {
    owner_name: String,
    store: Arc<dyn TaskStore>,
    events: broadcast::Sender<TaskChange>,
}

impl TaskServer {
    pub fn new(owner_name: &str, store: Arc<dyn TaskStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            owner_name: owner_name.to_string(),
            store,
            events,
        }
    }

    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    /// Subscribe to change notifications for all tasks of this server.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskChange> {
        self.events.subscribe()
    }

    /// Start tracking a new unit of work. Returns the resource path the
    /// task is reachable under. No task exists if this fails.
    pub async fn create_task(&self) -> TrackerResult<String> {
        let task = Task::new(&self.owner_name);
        self.store.write(&task).await?;

        let resource = task.resource();
        log::info!("created task {resource}");
        self.emit(&resource, None, &task.to_model());
        Ok(resource)
    }

    /// Update the progress of a running task.
    ///
    /// Progress never moves backwards and is capped at 100.
    pub async fn set_task_progress(&self, resource: &str, progress: i32) -> TrackerResult<()> {
        if progress < 0 {
            return Err(TrackerError::Invalid(format!(
                "progress must be >= 0, got {progress}"
            )));
        }

        let id = self.resolve(resource)?;
        let mut task = self.store.read_by_id(id).await?;
        if task.is_terminal() {
            return Err(TrackerError::Conflict(format!(
                "task {resource} already {}",
                task.status()
            )));
        }

        let before = task.to_model();
        task.progress = task.progress.max(progress.min(100));
        self.store.write(&task).await?;

        self.emit(resource, Some(&before), &task.to_model());
        Ok(())
    }

    /// Mark a task as successfully finished with `result`.
    pub async fn complete_task(
        &self,
        resource: &str,
        result: serde_json::Value,
    ) -> TrackerResult<()> {
        self.finish(resource, Some(result), None).await
    }

    /// Mark a task as failed with a human-readable message.
    pub async fn fail_task(&self, resource: &str, error: &str) -> TrackerResult<()> {
        self.finish(resource, None, Some(error.to_string())).await
    }

    /// Fetch the wire model for a resource path owned by this server.
    pub async fn get_model(&self, resource: &str) -> TrackerResult<TaskModel> {
        let id = self.resolve(resource)?;
        let task = self.store.read_by_id(id).await?;
        Ok(task.to_model())
    }

    async fn finish(
        &self,
        resource: &str,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> TrackerResult<()> {
        let id = self.resolve(resource)?;
        let mut task = self.store.read_by_id(id).await?;
        if task.is_terminal() {
            return Err(TrackerError::Conflict(format!(
                "task {resource} already {}",
                task.status()
            )));
        }

        let before = task.to_model();
        if result.is_some() {
            // Success implies full progress; failure keeps the last
            // observed value.
            task.progress = 100;
        }
        task.result = result;
        task.error = error;
        task.ended_at = Some(Utc::now());
        self.store.write(&task).await?;

        let after = task.to_model();
        log::info!("task {resource} finished as {}", after.status);
        self.emit(resource, Some(&before), &after);
        Ok(())
    }

    /// Parse a resource path and check it belongs to this server.
    /// Foreign owners read as not found rather than leaking existence.
    fn resolve(&self, resource: &str) -> TrackerResult<Uuid> {
        let (owner, id) = parse_resource_path(resource)?;
        if owner != self.owner_name {
            return Err(TrackerError::NotFound(resource.to_string()));
        }
        Ok(id)
    }

    fn emit(&self, resource: &str, before: Option<&TaskModel>, after: &TaskModel) {
        let fields = changed_fields(before, after);
        if fields.is_empty() {
            return;
        }
        // Send fails only when nobody is subscribed.
        let _ = self.events.send(TaskChange {
            resource: resource.to_string(),
            fields,
        });
    }
}

/// Object diff between two wire model snapshots: fields added or
/// changed carry their new value, removed fields carry `null`.
fn changed_fields(
    before: Option<&TaskModel>,
    after: &TaskModel,
) -> serde_json::Map<String, serde_json::Value> {
    let to_object = |model: &TaskModel| match serde_json::to_value(model) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };

    let old = before.map(to_object).unwrap_or_default();
    let new = to_object(after);

    let mut fields = serde_json::Map::new();
    for (key, value) in &new {
        if old.get(key) != Some(value) {
            fields.insert(key.clone(), value.clone());
        }
    }
    for key in old.keys() {
        if !new.contains_key(key) {
            fields.insert(key.clone(), serde_json::Value::Null);
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn server() -> TaskServer {
        TaskServer::new("svc", Arc::new(MemoryStore::default()))
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let srv = server();
        let resource = srv.create_task().await.unwrap();

        srv.set_task_progress(&resource, 60).await.unwrap();
        srv.set_task_progress(&resource, 30).await.unwrap();

        assert_eq!(srv.get_model(&resource).await.unwrap().progress, 60);
    }

    #[tokio::test]
    async fn test_progress_capped_at_100() {
        let srv = server();
        let resource = srv.create_task().await.unwrap();

        srv.set_task_progress(&resource, 250).await.unwrap();
        assert_eq!(srv.get_model(&resource).await.unwrap().progress, 100);
    }

    #[tokio::test]
    async fn test_complete_clears_error_and_sets_result() {
        let srv = server();
        let resource = srv.create_task().await.unwrap();
        srv.complete_task(&resource, json!(true)).await.unwrap();

        let model = srv.get_model(&resource).await.unwrap();
        assert_eq!(model.status, TaskStatus::Completed);
        assert_eq!(model.progress, 100);
        assert!(model.error.is_none());
        assert_eq!(model.result.unwrap().data, json!(true));
    }

    #[tokio::test]
    async fn test_terminal_task_rejects_mutation() {
        let srv = server();
        let resource = srv.create_task().await.unwrap();
        srv.fail_task(&resource, "boom").await.unwrap();

        assert!(matches!(
            srv.set_task_progress(&resource, 10).await.unwrap_err(),
            TrackerError::Conflict(_)
        ));
        assert!(matches!(
            srv.complete_task(&resource, json!(1)).await.unwrap_err(),
            TrackerError::Conflict(_)
        ));
        assert!(matches!(
            srv.fail_task(&resource, "again").await.unwrap_err(),
            TrackerError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_foreign_owner_reads_as_not_found() {
        let srv = server();
        let resource = srv.create_task().await.unwrap();
        let foreign = resource.replacen("svc", "other", 1);

        assert!(matches!(
            srv.get_model(&foreign).await.unwrap_err(),
            TrackerError::NotFound(_)
        ));
    }

    #[test]
    fn test_changed_fields_diff() {
        let mut task = Task::new("svc");
        let started = task.to_model();

        task.progress = 50;
        let progressed = task.to_model();
        let diff = changed_fields(Some(&started), &progressed);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff.get("progress"), Some(&json!(50)));

        task.error = Some("boom".to_string());
        let failed = task.to_model();
        let diff = changed_fields(Some(&progressed), &failed);
        assert_eq!(diff.get("status"), Some(&json!("failed")));
        assert_eq!(diff.get("error"), Some(&json!("boom")));
    }
}
