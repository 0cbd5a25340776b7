//! List run history query
//!
//! Paged run history, newest-first, optionally filtered by pipeline type.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::super::NormalizedRun;
use crate::error::AppResult;
use crate::features::shared::pagination::{PageParams, Pagination};
use crate::ingest::registry::RunRegistry;

/// Query to list run history
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListHistoryQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    /// Filter by pipeline type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_run: Option<String>,
}

/// Response for the history query
#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub logs: Vec<NormalizedRun>,
    pub pagination: Pagination,
}

impl Request<AppResult<HistoryResponse>> for ListHistoryQuery {}

pub async fn handle(pool: SqlitePool, query: ListHistoryQuery) -> AppResult<HistoryResponse> {
    let params = PageParams::new(query.limit, query.offset);
    let registry = RunRegistry::new(pool);

    let (runs, total) = registry
        .history(query.type_run.as_deref(), params.limit(), params.offset())
        .await?;

    Ok(HistoryResponse {
        logs: runs.into_iter().map(NormalizedRun::from).collect(),
        pagination: Pagination::from_params(&params, total),
    })
}
