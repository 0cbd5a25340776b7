//! End-to-end pipeline tests
//!
//! Runs the detached fetch_category_subject pipeline against a mocked
//! upstream export API and verifies run finalization, sink contents and
//! the event trail.

mod common;

use common::{count_rows, mock_upstream, test_pool};
use lmsync_server::error::AppError;
use lmsync_server::ingest::events::EventLog;
use lmsync_server::ingest::pipeline::CATEGORY_SUBJECT;
use lmsync_server::ingest::registry::{RunRegistry, RunStatus};
use lmsync_server::ingest::{PipelineExecutor, TriggerParams};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_export_endpoints(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/export/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"category_id": 1, "name": "Science", "parent_id": null, "course_count": 10},
            {"category_id": 2, "name": "Arts", "parent_id": null, "course_count": 3},
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/export/subjects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"subject_id": 10, "category_id": 1, "name": "Algebra", "code": "ALG"},
            {"subject_id": 11, "category_id": 1, "name": "Geometry", "code": "GEO"},
            {"subject_id": 12, "category_id": 2, "name": "Painting", "code": "PAI"},
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_detached_run_completes_and_finalizes() {
    let server = MockServer::start().await;
    mount_export_endpoints(&server).await;

    let pool = test_pool().await;
    let executor = PipelineExecutor::new(pool.clone(), mock_upstream(&server.uri()));

    let (run_id, handle) = executor
        .trigger_detached(TriggerParams::default())
        .await
        .unwrap();

    // The trigger returns before the body completes
    handle.await.unwrap();

    let registry = RunRegistry::new(pool.clone());
    let run = registry.get(run_id).await.unwrap().unwrap();
    assert_eq!(run.run_status(), Some(RunStatus::Finished));
    assert_eq!(run.total_records, 5);
    assert!(run.duration.is_some());

    assert_eq!(count_rows(&pool, "report_categories").await, 2);
    assert_eq!(count_rows(&pool, "report_subjects").await, 3);

    // Event trail runs from 0 to 100
    let log = EventLog::new(pool);
    let (events, _) = log.page(run_id, 50, 0).await.unwrap();
    assert_eq!(events.first().unwrap().progress, Some(0));
    assert_eq!(events.last().unwrap().progress, Some(100));
    assert!(events.iter().any(|e| e.level == "progress"));
}

#[tokio::test]
async fn test_second_trigger_conflicts_while_running() {
    let server = MockServer::start().await;

    // Slow upstream keeps the first run in flight
    Mock::given(method("GET"))
        .and(path("/export/categories"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(std::time::Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/export/subjects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let pool = test_pool().await;
    let executor = PipelineExecutor::new(pool.clone(), mock_upstream(&server.uri()));

    let (_run_id, handle) = executor
        .trigger_detached(TriggerParams::default())
        .await
        .unwrap();

    let err = executor
        .trigger_detached(TriggerParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    handle.await.unwrap();

    // Once terminal, a new run is accepted
    executor
        .trigger_detached(TriggerParams::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_upstream_failure_finalizes_run_as_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/export/categories"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let pool = test_pool().await;
    let executor = PipelineExecutor::new(pool.clone(), mock_upstream(&server.uri()));

    let (run_id, handle) = executor
        .trigger_detached(TriggerParams::default())
        .await
        .unwrap();
    handle.await.unwrap();

    let registry = RunRegistry::new(pool.clone());
    let run = registry.get(run_id).await.unwrap().unwrap();
    assert_eq!(run.run_status(), Some(RunStatus::Failed));
    assert_eq!(run.total_records, 0);
    assert!(run.end_time.is_some());

    // The failure is recorded in the event log, not surfaced to the caller
    let log = EventLog::new(pool);
    let (events, _) = log.page(run_id, 50, 0).await.unwrap();
    let error_event = events.iter().find(|e| e.level == "error").unwrap();
    assert!(error_event.message.starts_with("Pipeline failed:"));

    assert!(!registry.is_running(CATEGORY_SUBJECT).await.unwrap());
}
