//! Feature modules implementing the sync API
//!
//! Each feature is a vertical slice following the CQRS (Command Query
//! Responsibility Segregation) pattern, with its own commands, queries
//! and routes.
//!
//! # Features
//!
//! - **pipeline**: Triggering the local pipeline and the two-phase orchestration
//! - **runs**: Run status and paged history
//! - **events**: Per-run event pages and live SSE streaming
//!
//! Commands and queries implement the mediator pattern using the
//! `mediator` crate, keeping the HTTP layer thin over free handler
//! functions that are easy to test against a pool.

pub mod events;
pub mod pipeline;
pub mod runs;
pub mod shared;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;

use crate::config::{Config, OrchestratorSettings};
use crate::ingest::orchestrator::OrchestratorConfig;
use crate::ingest::upstream::UpstreamClient;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// SQLite connection pool
    pub db: sqlx::SqlitePool,
    /// Client for the upstream LMS export service
    pub upstream: Arc<UpstreamClient>,
    /// Polling parameters for the orchestrator
    pub orchestrator: OrchestratorConfig,
    /// Interval between event-log polls on the SSE stream
    pub stream_poll_interval: Duration,
}

impl FeatureState {
    pub fn new(db: sqlx::SqlitePool, upstream: Arc<UpstreamClient>, config: &Config) -> Self {
        Self::with_settings(db, upstream, &config.orchestrator)
    }

    pub fn with_settings(
        db: sqlx::SqlitePool,
        upstream: Arc<UpstreamClient>,
        settings: &OrchestratorSettings,
    ) -> Self {
        Self {
            db,
            upstream,
            orchestrator: OrchestratorConfig::from(settings),
            stream_poll_interval: Duration::from_secs(settings.stream_poll_interval_secs),
        }
    }
}

/// Creates the main API router with all feature routes mounted
///
/// Routes are flat under the caller's prefix:
/// - `POST /run`, `POST /orchestrate` - pipeline triggers
/// - `GET /status`, `GET /history` - run queries
/// - `GET /logs/:run_id`, `GET /logs/:run_id/realtime` - event queries
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .merge(pipeline::pipeline_routes())
        .merge(runs::routes::runs_routes())
        .merge(events::events_routes())
        .with_state(state)
}
