//! Page events query
//!
//! Chronological page of a run's events, after verifying the run exists.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};
use crate::features::shared::pagination::{PageParams, Pagination};
use crate::ingest::events::{Event, EventLog};
use crate::ingest::registry::RunRegistry;

/// Query to page a run's events
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PageEventsQuery {
    pub run_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

/// Response for the page events query
#[derive(Debug, Clone, Serialize)]
pub struct EventsResponse {
    pub logs: Vec<Event>,
    pub pagination: Pagination,
}

impl Request<AppResult<EventsResponse>> for PageEventsQuery {}

pub async fn handle(pool: SqlitePool, query: PageEventsQuery) -> AppResult<EventsResponse> {
    let registry = RunRegistry::new(pool.clone());
    if registry.get(query.run_id).await?.is_none() {
        return Err(AppError::not_found("Run", query.run_id));
    }

    let params = PageParams::new(query.limit, query.offset);
    let log = EventLog::new(pool);

    let (events, total) = log
        .page(query.run_id, params.limit(), params.offset())
        .await?;

    Ok(EventsResponse {
        logs: events,
        pagination: Pagination::from_params(&params, total),
    })
}
