//! Run status and history feature
//!
//! Read-only endpoints over the run registry: current pipeline status
//! and paged run history.

pub mod queries;
pub mod routes;

use serde::{Deserialize, Serialize};

use crate::ingest::registry::{Run, RunStatus};

/// Run representation served by the status/history endpoints
///
/// `status` is normalized to `finished | inprogress | failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedRun {
    pub id: i64,
    pub type_run: String,
    pub start_date: chrono::DateTime<chrono::Utc>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub duration: Option<String>,
    pub status: String,
    pub total_records: i64,
    pub offset: Option<i64>,
}

impl From<Run> for NormalizedRun {
    fn from(run: Run) -> Self {
        let status = match run.run_status() {
            Some(RunStatus::Running) => "inprogress",
            Some(RunStatus::Finished) => "finished",
            Some(RunStatus::Failed) | None => "failed",
        };

        Self {
            id: run.id,
            type_run: run.pipeline_type,
            start_date: run.start_time,
            end_date: run.end_time,
            duration: run.duration,
            status: status.to_string(),
            total_records: run.total_records,
            offset: run.last_offset,
        }
    }
}
