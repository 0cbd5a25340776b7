//! Run registry
//!
//! Durable store of pipeline run records, one per invocation of a named
//! pipeline type. At most one run per type may be `running` at any instant;
//! the invariant is enforced by a partial unique index so concurrent
//! triggers cannot both slip past a read-then-write check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};

/// Run status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "finished" => Ok(RunStatus::Finished),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid run status: {}", s)),
        }
    }
}

/// One pipeline invocation
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Run {
    pub id: i64,
    pub pipeline_type: String,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Wall-clock delta between start and end, formatted `HH:MM:SS`
    pub duration: Option<String>,
    pub total_records: i64,
    pub last_offset: Option<i64>,
}

impl Run {
    pub fn run_status(&self) -> Option<RunStatus> {
        self.status.parse().ok()
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running.as_str()
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_running()
    }
}

/// Format the wall-clock delta between two instants as zero-padded `HH:MM:SS`
pub fn format_duration(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let total_secs = (end - start).num_seconds().max(0);
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

const RUN_COLUMNS: &str = "id, pipeline_type, status, start_time, end_time, \
                           duration, total_records, last_offset";

/// Registry of pipeline runs
#[derive(Clone)]
pub struct RunRegistry {
    pool: SqlitePool,
}

impl RunRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new run with status `running`
    ///
    /// Fails with Conflict when a run of that type is already running.
    pub async fn create(&self, pipeline_type: &str) -> AppResult<Run> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO pipeline_runs (pipeline_type, status, start_time) VALUES (?, ?, ?)",
        )
        .bind(pipeline_type)
        .bind(RunStatus::Running.as_str())
        .bind(now)
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(r) => r,
            Err(e) => {
                if is_unique_violation(&e) {
                    return Err(AppError::Conflict(format!(
                        "A '{}' run is already in progress",
                        pipeline_type
                    )));
                }
                return Err(e.into());
            },
        };

        let run = self
            .get(result.last_insert_rowid())
            .await?
            .ok_or_else(|| AppError::Internal("run vanished after insert".to_string()))?;

        tracing::info!(run_id = run.id, pipeline = %pipeline_type, "Run created");
        Ok(run)
    }

    /// Finalize a run with a terminal status
    ///
    /// Sets `end_time`, the computed `duration`, `status` and
    /// `total_records`. Runs are mutated exactly once, at terminal time.
    pub async fn finalize(
        &self,
        run_id: i64,
        status: RunStatus,
        total_records: i64,
    ) -> AppResult<Run> {
        let run = self
            .get(run_id)
            .await?
            .ok_or_else(|| AppError::not_found("Run", run_id))?;

        let end_time = Utc::now();
        let duration = format_duration(run.start_time, end_time);

        sqlx::query(
            "UPDATE pipeline_runs \
             SET status = ?, end_time = ?, duration = ?, total_records = ? \
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(end_time)
        .bind(&duration)
        .bind(total_records)
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            run_id,
            status = %status,
            total_records,
            duration = %duration,
            "Run finalized"
        );

        self.get(run_id)
            .await?
            .ok_or_else(|| AppError::not_found("Run", run_id))
    }

    /// Fetch a run by id
    pub async fn get(&self, run_id: i64) -> AppResult<Option<Run>> {
        let run = sqlx::query_as::<_, Run>(&format!(
            "SELECT {} FROM pipeline_runs WHERE id = ?",
            RUN_COLUMNS
        ))
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(run)
    }

    /// Most recent run of a pipeline type, if any
    pub async fn latest(&self, pipeline_type: &str) -> AppResult<Option<Run>> {
        let run = sqlx::query_as::<_, Run>(&format!(
            "SELECT {} FROM pipeline_runs WHERE pipeline_type = ? ORDER BY id DESC LIMIT 1",
            RUN_COLUMNS
        ))
        .bind(pipeline_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(run)
    }

    /// Whether a run of this type is currently running
    pub async fn is_running(&self, pipeline_type: &str) -> AppResult<bool> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM pipeline_runs WHERE pipeline_type = ? AND status = ?)",
        )
        .bind(pipeline_type)
        .bind(RunStatus::Running.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    /// Page through run history, newest-first by id
    pub async fn history(
        &self,
        pipeline_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Run>, i64)> {
        let (runs, total) = match pipeline_type {
            Some(pipeline) => {
                let runs = sqlx::query_as::<_, Run>(&format!(
                    "SELECT {} FROM pipeline_runs WHERE pipeline_type = ? \
                     ORDER BY id DESC LIMIT ? OFFSET ?",
                    RUN_COLUMNS
                ))
                .bind(pipeline)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;

                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM pipeline_runs WHERE pipeline_type = ?",
                )
                .bind(pipeline)
                .fetch_one(&self.pool)
                .await?;

                (runs, total)
            },
            None => {
                let runs = sqlx::query_as::<_, Run>(&format!(
                    "SELECT {} FROM pipeline_runs ORDER BY id DESC LIMIT ? OFFSET ?",
                    RUN_COLUMNS
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;

                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pipeline_runs")
                    .fetch_one(&self.pool)
                    .await?;

                (runs, total)
            },
        };

        Ok((runs, total))
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = error {
        return db_err.is_unique_violation();
    }
    false
}
