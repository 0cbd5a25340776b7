//! Run status and history routes
//!
//! Public read-only routes for querying pipeline status and run history.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use super::queries::{
    get_status::handle as handle_get_status, list_history::handle as handle_list_history,
    GetStatusQuery, ListHistoryQuery,
};
use crate::error::AppResult;
use crate::features::FeatureState;

/// Create run routes
pub fn runs_routes() -> Router<FeatureState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/history", get(list_history))
}

/// Current pipeline status
///
/// GET /status?type_run=fetch_category_subject
async fn get_status(
    State(state): State<FeatureState>,
    Query(query): Query<GetStatusQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let response = handle_get_status(state.db, query).await?;
    Ok(Json(serde_json::json!(response)))
}

/// Paged run history, newest-first
///
/// GET /history?limit=50&offset=0&type_run=fetch_category_subject
async fn list_history(
    State(state): State<FeatureState>,
    Query(query): Query<ListHistoryQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let response = handle_list_history(state.db, query).await?;
    Ok(Json(serde_json::json!(response)))
}
