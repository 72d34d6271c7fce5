//! The task entity, its derived status and its wire representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TrackerError, TrackerResult};

/// Derived lifecycle state of a task. Never stored — computed from the
/// `result`/`error` fields on demand.
///
/// ```text
/// started → completed
///         → failed
/// ```
///
/// Both terminal states are final; a task never re-enters `started`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Started,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the task has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single unit of asynchronous work tracked by the subsystem.
///
/// Invariants:
/// - `result` and `error` are never both set.
/// - `ended_at` is `Some` if and only if the task is terminal.
/// - Records are replaced wholesale on write, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    /// Logical name of the service that created the task. Forms the
    /// externally visible resource path together with `id`.
    pub owner_name: String,
    /// Integer percentage in `[0, 100]`.
    pub progress: i32,
    /// Success payload; mutually exclusive with `error`.
    pub result: Option<serde_json::Value>,
    /// Failure message; mutually exclusive with `result`.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Set exactly once, the moment the task becomes terminal.
    pub ended_at: Option<DateTime<Utc>>,
    /// Used only for oldest-first eviction in the in-memory backend.
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Build a fresh task in the `started` state.
    pub fn new(owner_name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_name: owner_name.to_string(),
            progress: 0,
            result: None,
            error: None,
            started_at: now,
            ended_at: None,
            created_at: now,
        }
    }

    pub fn status(&self) -> TaskStatus {
        if self.error.is_some() {
            TaskStatus::Failed
        } else if self.result.is_some() {
            TaskStatus::Completed
        } else {
            TaskStatus::Started
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// The externally addressable resource path for this task.
    pub fn resource(&self) -> String {
        resource_path(&self.owner_name, self.id)
    }

    /// Project the task into its wire representation.
    pub fn to_model(&self) -> TaskModel {
        TaskModel {
            status: self.status(),
            progress: self.progress,
            error: self.error.clone(),
            result: self
                .result
                .clone()
                .map(|data| ResultEnvelope { data }),
        }
    }
}

/// `<owner_name>.tasks.<task_id>`
pub fn resource_path(owner_name: &str, id: Uuid) -> String {
    format!("{owner_name}.tasks.{id}")
}

/// Split a resource path back into its owner name and task id.
///
/// Owner names may themselves contain dots, so the split happens at the
/// last `.tasks.` separator.
pub fn parse_resource_path(resource: &str) -> TrackerResult<(String, Uuid)> {
    let (owner, id) = resource
        .rsplit_once(".tasks.")
        .ok_or_else(|| TrackerError::Invalid(format!("malformed resource path: {resource}")))?;
    let id = Uuid::parse_str(id)
        .map_err(|_| TrackerError::Invalid(format!("malformed task id in path: {resource}")))?;
    Ok((owner.to_string(), id))
}

/// Wire model of a task as exposed to subscribers and the wait client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskModel {
    pub status: TaskStatus,
    pub progress: i32,
    /// Present only when `status == failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present only when `status == completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultEnvelope>,
}

/// Success payloads travel wrapped in a `data` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub data: serde_json::Value,
}
