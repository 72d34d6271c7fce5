//! Relational backend: one row per task, keyed by id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use super::TaskStore;
use crate::error::{TrackerError, TrackerResult};
use crate::models::Task;
use crate::{Conn, DbPool};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tracked_task (
    id          UUID PRIMARY KEY,
    owner_name  TEXT NOT NULL,
    progress    INTEGER NOT NULL,
    error       TEXT,
    result      JSONB,
    started_at  TIMESTAMPTZ NOT NULL,
    ended_at    TIMESTAMPTZ,
    created_at  TIMESTAMPTZ NOT NULL
)";

#[derive(Debug, Identifiable, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::tracked_task)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
struct TaskRow {
    id: Uuid,
    owner_name: String,
    progress: i32,
    error: Option<String>,
    result: Option<serde_json::Value>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            owner_name: row.owner_name,
            progress: row.progress,
            result: row.result,
            error: row.error,
            started_at: row.started_at,
            ended_at: row.ended_at,
            created_at: row.created_at,
        }
    }
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        TaskRow {
            id: task.id,
            owner_name: task.owner_name.clone(),
            progress: task.progress,
            error: task.error.clone(),
            result: task.result.clone(),
            started_at: task.started_at,
            ended_at: task.ended_at,
            created_at: task.created_at,
        }
    }
}

/// Build a deadpool-backed async connection pool for the given DSN.
pub fn build_pool(database_url: &str) -> TrackerResult<DbPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    DbPool::builder(manager)
        .max_size(10)
        .build()
        .map_err(|e| TrackerError::Pool(e.to_string()))
}

/// Task store backed by PostgreSQL. The schema is applied on
/// construction, so pointing it at an empty database just works.
pub struct PgTaskStore {
    pool: DbPool,
}

impl PgTaskStore {
    pub async fn new(pool: DbPool) -> TrackerResult<Self> {
        let mut conn = get_conn(&pool).await?;
        diesel::sql_query(SCHEMA).execute(&mut conn).await?;
        Ok(Self { pool })
    }
}

async fn get_conn(pool: &DbPool) -> TrackerResult<Conn> {
    pool.get()
        .await
        .map_err(|e| TrackerError::Pool(e.to_string()))
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn read_by_id(&self, id: Uuid) -> TrackerResult<Task> {
        use crate::schema::tracked_task::dsl;

        let mut conn = get_conn(&self.pool).await?;
        let row = dsl::tracked_task
            .find(id)
            .select(TaskRow::as_select())
            .first::<TaskRow>(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))?;
        Ok(row.into())
    }

    async fn write(&self, task: &Task) -> TrackerResult<()> {
        use crate::schema::tracked_task::dsl;

        let mut conn = get_conn(&self.pool).await?;
        let row = TaskRow::from(task);
        diesel::insert_into(dsl::tracked_task)
            .values(&row)
            .on_conflict(dsl::id)
            .do_update()
            .set(&row)
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}
