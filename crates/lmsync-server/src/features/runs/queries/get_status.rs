//! Get pipeline status query
//!
//! Reports the latest run of a pipeline type and whether one is
//! currently in progress.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::super::NormalizedRun;
use crate::error::AppResult;
use crate::ingest::pipeline::CATEGORY_SUBJECT;
use crate::ingest::registry::RunRegistry;

/// Query for the current pipeline status
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GetStatusQuery {
    /// Pipeline type; defaults to the category/subject pipeline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_run: Option<String>,
}

/// Response for the status query
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub last_run: Option<NormalizedRun>,
    pub is_running: bool,
}

impl Request<AppResult<StatusResponse>> for GetStatusQuery {}

pub async fn handle(pool: SqlitePool, query: GetStatusQuery) -> AppResult<StatusResponse> {
    let pipeline_type = query.type_run.as_deref().unwrap_or(CATEGORY_SUBJECT);
    let registry = RunRegistry::new(pool);

    let last_run = registry.latest(pipeline_type).await?;
    let is_running = registry.is_running(pipeline_type).await?;

    Ok(StatusResponse {
        status: "ok".to_string(),
        last_run: last_run.map(NormalizedRun::from),
        is_running,
    })
}
