//! Background pipeline executor
//!
//! Detaches a pipeline invocation from the triggering request: the run
//! record is created synchronously (so a Conflict still reaches the
//! caller), then the body runs on a spawned task and the call returns.
//! Errors inside the detached body are recorded as error events and the
//! run is finalized as failed; they are never delivered to the original
//! caller. There is no cancellation path once a body has started, but the
//! returned join handle lets callers observe completion.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;

use super::events::{EventLevel, EventLog};
use super::pipeline::{CategorySubjectPipeline, CATEGORY_SUBJECT};
use super::registry::{RunRegistry, RunStatus};
use super::upstream::{TriggerParams, UpstreamClient};
use crate::error::AppResult;

/// Spawns pipeline bodies detached from the request/response lifecycle
#[derive(Clone)]
pub struct PipelineExecutor {
    pool: SqlitePool,
    upstream: Arc<UpstreamClient>,
}

impl PipelineExecutor {
    pub fn new(pool: SqlitePool, upstream: Arc<UpstreamClient>) -> Self {
        Self { pool, upstream }
    }

    /// Start the fetch_category_subject pipeline in the background
    ///
    /// Returns the new run id and the supervising join handle. Fails with
    /// Conflict when a run of this type is already in progress.
    pub async fn trigger_detached(
        &self,
        params: TriggerParams,
    ) -> AppResult<(i64, JoinHandle<()>)> {
        let registry = RunRegistry::new(self.pool.clone());
        let run = registry.create(CATEGORY_SUBJECT).await?;
        let run_id = run.id;

        let pool = self.pool.clone();
        let upstream = self.upstream.clone();

        let handle = tokio::spawn(async move {
            run_and_finalize(pool, upstream, run_id, params).await;
        });

        Ok((run_id, handle))
    }
}

/// Drive the pipeline body and finalize its run on both outcome paths
async fn run_and_finalize(
    pool: SqlitePool,
    upstream: Arc<UpstreamClient>,
    run_id: i64,
    params: TriggerParams,
) {
    let registry = RunRegistry::new(pool.clone());
    let events = EventLog::new(pool.clone());
    let pipeline = CategorySubjectPipeline::new(pool, upstream);

    match pipeline.execute(run_id, &params).await {
        Ok(total) => {
            if let Err(e) = registry.finalize(run_id, RunStatus::Finished, total).await {
                tracing::error!(run_id, error = %e, "Failed to finalize successful run");
            }
        },
        Err(e) => {
            tracing::error!(run_id, error = %e, "Pipeline body failed");

            if let Err(log_err) = events
                .append(
                    run_id,
                    EventLevel::Error,
                    &format!("Pipeline failed: {}", e),
                    None,
                    None,
                )
                .await
            {
                tracing::error!(run_id, error = %log_err, "Failed to record pipeline error");
            }

            if let Err(fin_err) = registry.finalize(run_id, RunStatus::Failed, 0).await {
                tracing::error!(run_id, error = %fin_err, "Failed to finalize failed run");
            }
        },
    }
}
