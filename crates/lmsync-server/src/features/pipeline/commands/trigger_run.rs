//! Trigger run command
//!
//! Starts the local fetch_category_subject pipeline in the background.
//! The response only acknowledges the start; progress is observed via
//! the status and log endpoints.

use std::sync::Arc;

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::ingest::executor::PipelineExecutor;
use crate::ingest::upstream::{TriggerParams, UpstreamClient};

/// Command to start the local pipeline
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TriggerRunCommand {
    #[serde(flatten)]
    pub params: TriggerParams,
}

/// Response for the trigger command
#[derive(Debug, Clone, Serialize)]
pub struct TriggerRunResponse {
    pub status: String,
}

impl Request<AppResult<TriggerRunResponse>> for TriggerRunCommand {}

pub async fn handle(
    pool: SqlitePool,
    upstream: Arc<UpstreamClient>,
    command: TriggerRunCommand,
) -> AppResult<TriggerRunResponse> {
    let executor = PipelineExecutor::new(pool, upstream);
    let (run_id, _handle) = executor.trigger_detached(command.params).await?;

    tracing::info!(run_id, "Pipeline run started");

    Ok(TriggerRunResponse {
        status: "started".to_string(),
    })
}
