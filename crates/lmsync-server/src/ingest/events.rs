//! Event log
//!
//! Append-only store of fine-grained progress and diagnostic records tied
//! to a run. Rows are never updated or deleted here; retention is an
//! external concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};

/// Event severity / kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warning,
    Error,
    Debug,
    Progress,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventLevel::Info => "info",
            EventLevel::Warning => "warning",
            EventLevel::Error => "error",
            EventLevel::Debug => "debug",
            EventLevel::Progress => "progress",
        }
    }
}

impl std::fmt::Display for EventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(EventLevel::Info),
            "warning" | "warn" => Ok(EventLevel::Warning),
            "error" => Ok(EventLevel::Error),
            "debug" => Ok(EventLevel::Debug),
            "progress" => Ok(EventLevel::Progress),
            _ => Err(anyhow::anyhow!("Invalid event level: {}", s)),
        }
    }
}

/// One diagnostic/progress record belonging to a run
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: i64,
    pub run_id: i64,
    pub level: String,
    pub message: String,
    /// Overall pipeline progress 0-100, when the event carries one
    pub progress: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub data: Option<serde_json::Value>,
}

const EVENT_COLUMNS: &str = "id, run_id, level, message, progress, timestamp, data";

/// Append-only event store
#[derive(Clone)]
pub struct EventLog {
    pool: SqlitePool,
}

impl EventLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an event to a run
    ///
    /// Fails with NotFound when the run does not exist.
    pub async fn append(
        &self,
        run_id: i64,
        level: EventLevel,
        message: &str,
        progress: Option<i64>,
        data: Option<serde_json::Value>,
    ) -> AppResult<Event> {
        let exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pipeline_runs WHERE id = ?)")
                .bind(run_id)
                .fetch_one(&self.pool)
                .await?;
        if exists == 0 {
            return Err(AppError::not_found("Run", run_id));
        }

        let result = sqlx::query(
            "INSERT INTO pipeline_events (run_id, level, message, progress, timestamp, data) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(run_id)
        .bind(level.as_str())
        .bind(message)
        .bind(progress)
        .bind(Utc::now())
        .bind(data)
        .execute(&self.pool)
        .await?;

        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM pipeline_events WHERE id = ?",
            EVENT_COLUMNS
        ))
        .bind(result.last_insert_rowid())
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    /// Page through a run's events in chronological order
    pub async fn page(
        &self,
        run_id: i64,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Event>, i64)> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM pipeline_events WHERE run_id = ? \
             ORDER BY timestamp ASC, id ASC LIMIT ? OFFSET ?",
            EVENT_COLUMNS
        ))
        .bind(run_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pipeline_events WHERE run_id = ?")
                .bind(run_id)
                .fetch_one(&self.pool)
                .await?;

        Ok((events, total))
    }

    /// Most recent `max_count` events, reordered ascending before return
    ///
    /// The store is queried newest-first for efficiency and the page is
    /// reversed so callers always observe chronological order.
    pub async fn tail(&self, run_id: i64, max_count: i64) -> AppResult<Vec<Event>> {
        let mut events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM pipeline_events WHERE run_id = ? ORDER BY id DESC LIMIT ?",
            EVENT_COLUMNS
        ))
        .bind(run_id)
        .bind(max_count)
        .fetch_all(&self.pool)
        .await?;

        events.reverse();
        Ok(events)
    }

    /// Events appended after `after_id`, in ascending id order
    pub async fn since(&self, run_id: i64, after_id: i64) -> AppResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM pipeline_events WHERE run_id = ? AND id > ? ORDER BY id ASC",
            EVENT_COLUMNS
        ))
        .bind(run_id)
        .bind(after_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
