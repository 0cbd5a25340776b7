//! Event routes
//!
//! Paged event history plus a live SSE stream for a run.

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event as SseEvent, Sse},
    routing::get,
    Json, Router,
};
use futures::Stream;
use serde::Deserialize;

use super::queries::{page_events::handle as handle_page_events, PageEventsQuery};
use super::stream::run_event_stream;
use crate::error::{AppError, AppResult};
use crate::features::FeatureState;
use crate::ingest::registry::RunRegistry;

/// Create event routes
pub fn events_routes() -> Router<FeatureState> {
    Router::new()
        .route("/logs/:run_id", get(page_events))
        .route("/logs/:run_id/realtime", get(stream_events))
}

#[derive(Debug, Deserialize, Default)]
struct PageQueryString {
    limit: Option<i64>,
    offset: Option<i64>,
}

/// Chronological page of a run's events
///
/// GET /logs/:run_id?limit=50&offset=0
async fn page_events(
    State(state): State<FeatureState>,
    Path(run_id): Path<i64>,
    Query(page): Query<PageQueryString>,
) -> AppResult<Json<serde_json::Value>> {
    let query = PageEventsQuery {
        run_id,
        limit: page.limit,
        offset: page.offset,
    };

    let response = handle_page_events(state.db, query).await?;
    Ok(Json(serde_json::json!(response)))
}

/// Live event stream for a run
///
/// GET /logs/:run_id/realtime
async fn stream_events(
    State(state): State<FeatureState>,
    Path(run_id): Path<i64>,
) -> AppResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    let registry = RunRegistry::new(state.db.clone());
    if registry.get(run_id).await?.is_none() {
        return Err(AppError::not_found("Run", run_id));
    }

    run_event_stream(state.db, run_id, state.stream_poll_interval).await
}
