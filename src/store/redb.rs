//! Embedded key-value backend built on redb, with per-record expiry and
//! a background compaction loop.
//!
//! Each task is serialized as JSON together with an `expires_at`
//! timestamp. Reads treat a missing or expired record as `NotFound`.
//! A dedicated tokio task owned by the store sweeps expired records on
//! a fixed interval, repeating passes until a pass reclaims nothing.
//! Sweep failures are logged, never surfaced to callers — this is
//! maintenance, not a request path.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use super::TaskStore;
use crate::error::{TrackerError, TrackerResult};
use crate::models::Task;

const TASKS: TableDefinition<&str, &[u8]> = TableDefinition::new("tasks");

/// Expired records are removed in batches of this size per pass.
const SWEEP_BATCH: usize = 128;

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_COMPACTION_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Serialize, Deserialize)]
struct Record {
    task: Task,
    expires_at: DateTime<Utc>,
}

/// Task store backed by a redb database file.
///
/// The compaction loop lives as long as the store: dropping the store
/// closes the shutdown channel, which stops the loop on its next wake.
pub struct RedbStore {
    db: Arc<Database>,
    retention: TimeDelta,
    _shutdown: watch::Sender<bool>,
}

impl RedbStore {
    /// Open or create a database at `path` and start the compaction loop.
    pub fn open(
        path: &Path,
        retention: Duration,
        compaction_interval: Duration,
    ) -> TrackerResult<Self> {
        let retention = TimeDelta::from_std(retention)
            .map_err(|_| TrackerError::Invalid("retention out of range".to_string()))?;

        let db = Database::create(path).map_err(storage)?;

        // Ensure the table exists so later read transactions can open it.
        let txn = db.begin_write().map_err(storage)?;
        {
            let _table = txn.open_table(TASKS).map_err(storage)?;
        }
        txn.commit().map_err(storage)?;

        let db = Arc::new(db);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(compaction_loop(
            db.clone(),
            compaction_interval,
            shutdown_rx,
        ));

        Ok(Self {
            db,
            retention,
            _shutdown: shutdown_tx,
        })
    }
}

#[async_trait]
impl TaskStore for RedbStore {
    async fn read_by_id(&self, id: Uuid) -> TrackerResult<Task> {
        let db = self.db.clone();
        let key = id.to_string();
        let raw = tokio::task::spawn_blocking(move || -> TrackerResult<Option<Vec<u8>>> {
            let txn = db.begin_read().map_err(storage)?;
            let table = txn.open_table(TASKS).map_err(storage)?;
            match table.get(key.as_str()).map_err(storage)? {
                Some(guard) => Ok(Some(guard.value().to_vec())),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| TrackerError::Internal(e.to_string()))??;

        let raw = raw.ok_or_else(|| TrackerError::NotFound(id.to_string()))?;
        let record: Record = serde_json::from_slice(&raw)?;
        if record.expires_at <= Utc::now() {
            // Still on disk but past retention; the sweeper will get it.
            return Err(TrackerError::NotFound(id.to_string()));
        }
        Ok(record.task)
    }

    async fn write(&self, task: &Task) -> TrackerResult<()> {
        let record = Record {
            task: task.clone(),
            expires_at: Utc::now() + self.retention,
        };
        let bytes = serde_json::to_vec(&record)?;
        let key = task.id.to_string();
        let db = self.db.clone();

        tokio::task::spawn_blocking(move || -> TrackerResult<()> {
            let txn = db.begin_write().map_err(storage)?;
            {
                let mut table = txn.open_table(TASKS).map_err(storage)?;
                table.insert(key.as_str(), bytes.as_slice()).map_err(storage)?;
            }
            txn.commit().map_err(storage)?;
            Ok(())
        })
        .await
        .map_err(|e| TrackerError::Internal(e.to_string()))?
    }
}

async fn compaction_loop(db: Arc<Database>, every: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut tick = tokio::time::interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval fires immediately; skip the startup tick.
    tick.tick().await;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                run_compaction(&db).await;
            }
            _ = shutdown.changed() => {
                log::debug!("redb compaction loop stopping");
                break;
            }
        }
    }
}

/// Repeat sweep passes until one reclaims nothing.
async fn run_compaction(db: &Arc<Database>) {
    loop {
        let db = db.clone();
        match tokio::task::spawn_blocking(move || sweep_expired(&db)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => log::debug!("redb compaction reclaimed {n} expired tasks"),
            Ok(Err(e)) => {
                log::warn!("redb compaction pass failed: {e}");
                break;
            }
            Err(e) => {
                log::warn!("redb compaction task panicked: {e}");
                break;
            }
        }
    }
}

/// Remove up to [`SWEEP_BATCH`] expired records; returns how many went.
/// Records that no longer decode are treated as expired.
fn sweep_expired(db: &Database) -> TrackerResult<usize> {
    let now = Utc::now();

    let expired: Vec<String> = {
        let txn = db.begin_read().map_err(storage)?;
        let table = txn.open_table(TASKS).map_err(storage)?;
        let mut keys = Vec::new();
        for entry in table.iter().map_err(storage)? {
            let (key, value) = entry.map_err(storage)?;
            let dead = match serde_json::from_slice::<Record>(value.value()) {
                Ok(record) => record.expires_at <= now,
                Err(_) => true,
            };
            if dead {
                keys.push(key.value().to_string());
                if keys.len() >= SWEEP_BATCH {
                    break;
                }
            }
        }
        keys
    };

    if expired.is_empty() {
        return Ok(0);
    }

    let txn = db.begin_write().map_err(storage)?;
    {
        let mut table = txn.open_table(TASKS).map_err(storage)?;
        for key in &expired {
            table.remove(key.as_str()).map_err(storage)?;
        }
    }
    txn.commit().map_err(storage)?;
    Ok(expired.len())
}

fn storage<E: std::fmt::Display>(err: E) -> TrackerError {
    TrackerError::Storage(err.to_string())
}
