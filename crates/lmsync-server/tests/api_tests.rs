//! HTTP API integration tests
//!
//! Drives the feature router end to end: trigger a run, watch it through
//! the status endpoint and read back history and logs.

mod common;

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{fast_orchestrator, mock_upstream, test_pool};
use lmsync_server::features::{self, FeatureState};
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot` and `ready`
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn test_state(server: &MockServer) -> FeatureState {
    FeatureState {
        db: test_pool().await,
        upstream: mock_upstream(&server.uri()),
        orchestrator: fast_orchestrator(50),
        stream_poll_interval: Duration::from_millis(10),
    }
}

async fn mount_exports(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/export/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"category_id": 1, "name": "Science", "parent_id": null, "course_count": 10},
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/export/subjects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"subject_id": 10, "category_id": 1, "name": "Algebra", "code": "ALG"},
        ])))
        .mount(server)
        .await;
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn wait_until_idle(state: &FeatureState) {
    let registry = lmsync_server::ingest::RunRegistry::new(state.db.clone());
    for _ in 0..200 {
        if !registry
            .is_running(lmsync_server::ingest::pipeline::CATEGORY_SUBJECT)
            .await
            .unwrap()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("pipeline did not settle");
}

#[tokio::test]
async fn test_trigger_then_status_then_history() {
    let server = MockServer::start().await;
    mount_exports(&server).await;

    let state = test_state(&server).await;
    let app = features::router(state.clone());

    // Trigger
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/run")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "started");

    wait_until_idle(&state).await;

    // Status reflects the finished run
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["isRunning"], false);
    assert_eq!(body["lastRun"]["status"], "finished");
    assert_eq!(body["lastRun"]["total_records"], 2);

    // History lists it with pagination metadata
    let response = app
        .oneshot(
            Request::builder()
                .uri("/history?limit=10&offset=0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["logs"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["pagination"]["current_page"], 1);
}

#[tokio::test]
async fn test_concurrent_trigger_returns_conflict() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/export/categories"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/export/subjects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let state = test_state(&server).await;
    let app = features::router(state);

    let trigger = || {
        Request::builder()
            .method("POST")
            .uri("/run")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap()
    };

    let response = app.clone().oneshot(trigger()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(trigger()).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_logs_endpoint_pages_and_404s() {
    let server = MockServer::start().await;
    mount_exports(&server).await;

    let state = test_state(&server).await;
    let app = features::router(state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/run")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    wait_until_idle(&state).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/logs/1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["logs"].as_array().unwrap().len() >= 2);
    assert!(body["pagination"]["total"].as_i64().unwrap() >= 2);

    // Unknown run id is a 404, not an empty page
    let response = app
        .oneshot(Request::builder().uri("/logs/999").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_realtime_stream_emits_contract_frames() {
    use lmsync_server::ingest::events::EventLevel;
    use lmsync_server::ingest::registry::RunStatus;
    use lmsync_server::ingest::{EventLog, RunRegistry};

    let server = MockServer::start().await;
    let state = test_state(&server).await;
    let app = features::router(state.clone());

    let registry = RunRegistry::new(state.db.clone());
    let log = EventLog::new(state.db.clone());
    let run = registry.create("fetch_category_subject").await.unwrap();
    log.append(run.id, EventLevel::Info, "Pipeline started", Some(0), None)
        .await
        .unwrap();
    registry.finalize(run.id, RunStatus::Finished, 1).await.unwrap();

    // A finished run yields a bounded stream: connection, replayed log
    // frames, then the completion frame.
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/logs/{}/realtime", run.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(text.contains("event: connection"));
    assert!(text.contains("event: log"));
    assert!(text.contains("\"log_id\":"));
    assert!(text.contains("Pipeline started"));
    assert!(text.contains("event: completion"));
    assert!(text.contains("\"status\":\"finished\""));
}

#[tokio::test]
async fn test_orchestrate_returns_accepted_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/etl/trigger"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accepted": true})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/etl/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status_code": 2})))
        .mount(&server)
        .await;
    mount_exports(&server).await;

    let state = test_state(&server).await;
    let app = features::router(state.clone());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/orchestrate")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert!(body["orchestrationId"].as_str().is_some());
    assert_eq!(body["steps"][0]["name"], "upstream");
    assert_eq!(body["steps"][0]["status"], "running");

    wait_until_idle(&state).await;
}
