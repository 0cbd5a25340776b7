//! Two-phase sync orchestrator
//!
//! Sequences the upstream export pipeline and the local
//! fetch_category_subject pipeline behind one orchestration id. Each
//! phase is polled at a fixed interval up to a bounded attempt count; a
//! failed or timed-out step aborts the remainder.
//!
//! The session lives only in the spawned task's memory. A process restart
//! loses visibility into an in-flight orchestration except through the
//! two underlying run registries; that mirrors the upstream contract and
//! is a documented limitation, not an oversight.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use uuid::Uuid;

use super::executor::PipelineExecutor;
use super::pipeline::CATEGORY_SUBJECT;
use super::registry::{RunRegistry, RunStatus};
use super::upstream::{CompletionDiscriminator, PollOutcome, TriggerParams, UpstreamClient};
use crate::config::OrchestratorSettings;
use crate::error::{AppError, AppResult};

/// Step status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Running,
    Finished,
    Failed,
}

/// One phase of an orchestration
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub name: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Step {
    fn running(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }

    fn finish(&mut self) {
        self.status = StepStatus::Finished;
        self.finished_at = Some(Utc::now());
    }

    fn fail(&mut self, error: String) {
        self.status = StepStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }
}

/// Ephemeral, in-process coordination state for one orchestration
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationSession {
    pub id: Uuid,
    pub steps: Vec<Step>,
}

/// Polling parameters for both phases
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_poll_attempts: 180,
        }
    }
}

impl From<&OrchestratorSettings> for OrchestratorConfig {
    fn from(settings: &OrchestratorSettings) -> Self {
        Self {
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            max_poll_attempts: settings.max_poll_attempts,
        }
    }
}

/// Sequences the upstream and local pipelines for one trigger
pub struct SyncOrchestrator {
    pool: SqlitePool,
    upstream: Arc<UpstreamClient>,
    discriminator: Arc<dyn CompletionDiscriminator>,
    config: OrchestratorConfig,
}

impl SyncOrchestrator {
    pub fn new(
        pool: SqlitePool,
        upstream: Arc<UpstreamClient>,
        discriminator: Arc<dyn CompletionDiscriminator>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            pool,
            upstream,
            discriminator,
            config,
        }
    }

    /// Start an orchestration in the background
    ///
    /// Returns the initial session snapshot immediately; the steps mutate
    /// inside the detached task and the outcome is observable through the
    /// run registries.
    pub fn start(&self, params: TriggerParams) -> (OrchestrationSession, JoinHandle<()>) {
        let session = OrchestrationSession {
            id: Uuid::new_v4(),
            steps: vec![Step::running("upstream")],
        };
        let snapshot = session.clone();

        let pool = self.pool.clone();
        let upstream = self.upstream.clone();
        let discriminator = self.discriminator.clone();
        let config = self.config;

        let handle = tokio::spawn(async move {
            run_session(session, pool, upstream, discriminator, config, params).await;
        });

        (snapshot, handle)
    }
}

async fn run_session(
    mut session: OrchestrationSession,
    pool: SqlitePool,
    upstream: Arc<UpstreamClient>,
    discriminator: Arc<dyn CompletionDiscriminator>,
    config: OrchestratorConfig,
    params: TriggerParams,
) {
    tracing::info!(orchestration_id = %session.id, "Orchestration started");

    match run_upstream_step(&upstream, discriminator.as_ref(), &config, &params).await {
        Ok(()) => session.steps[0].finish(),
        Err(e) => {
            session.steps[0].fail(e.to_string());
            tracing::error!(
                orchestration_id = %session.id,
                error = %e,
                "Upstream step failed, orchestration aborted"
            );
            return;
        },
    }

    session.steps.push(Step::running("local"));

    match run_local_step(&pool, &upstream, &config, params).await {
        Ok(()) => {
            session.steps[1].finish();
            tracing::info!(orchestration_id = %session.id, "Orchestration finished");
        },
        Err(e) => {
            session.steps[1].fail(e.to_string());
            tracing::error!(
                orchestration_id = %session.id,
                error = %e,
                "Local step failed"
            );
        },
    }
}

/// Trigger the upstream export and poll its status until the
/// discriminator signals success or failure, or attempts are exhausted
async fn run_upstream_step(
    upstream: &UpstreamClient,
    discriminator: &dyn CompletionDiscriminator,
    config: &OrchestratorConfig,
    params: &TriggerParams,
) -> AppResult<()> {
    upstream.trigger_export(params).await?;

    for attempt in 1..=config.max_poll_attempts {
        sleep(config.poll_interval).await;

        let body = upstream.export_status().await?;
        match discriminator.interpret(&body) {
            PollOutcome::Succeeded => {
                tracing::info!(attempt, "Upstream export completed");
                return Ok(());
            },
            PollOutcome::Failed(reason) => {
                return Err(AppError::Upstream(reason));
            },
            PollOutcome::Pending => {
                tracing::debug!(attempt, "Upstream export still in progress");
            },
        }
    }

    Err(AppError::Timeout(format!(
        "upstream export did not complete within {} poll attempts",
        config.max_poll_attempts
    )))
}

/// Trigger the local pipeline and poll the run registry until its run
/// reaches a terminal status
async fn run_local_step(
    pool: &SqlitePool,
    upstream: &Arc<UpstreamClient>,
    config: &OrchestratorConfig,
    params: TriggerParams,
) -> AppResult<()> {
    let executor = PipelineExecutor::new(pool.clone(), upstream.clone());
    let (run_id, _handle) = executor.trigger_detached(params).await?;

    let registry = RunRegistry::new(pool.clone());

    for _attempt in 1..=config.max_poll_attempts {
        sleep(config.poll_interval).await;

        if registry.is_running(CATEGORY_SUBJECT).await? {
            continue;
        }

        let Some(run) = registry.latest(CATEGORY_SUBJECT).await? else {
            continue;
        };

        match run.run_status() {
            Some(RunStatus::Finished) => return Ok(()),
            Some(RunStatus::Failed) => {
                return Err(AppError::Internal(format!(
                    "local pipeline run {} failed",
                    run.id
                )));
            },
            _ => continue,
        }
    }

    Err(AppError::Timeout(format!(
        "local pipeline run {} did not complete within {} poll attempts",
        run_id, config.max_poll_attempts
    )))
}
