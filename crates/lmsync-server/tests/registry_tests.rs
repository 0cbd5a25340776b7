//! Run registry integration tests
//!
//! Exercises run creation, the one-running-run-per-type constraint,
//! finalization and history paging against an in-memory database.

mod common;

use common::test_pool;
use lmsync_server::error::AppError;
use lmsync_server::ingest::registry::{RunRegistry, RunStatus};

#[tokio::test]
async fn test_create_and_get_run() {
    let pool = test_pool().await;
    let registry = RunRegistry::new(pool);

    let run = registry.create("fetch_category_subject").await.unwrap();
    assert_eq!(run.status, "running");
    assert_eq!(run.pipeline_type, "fetch_category_subject");
    assert!(run.end_time.is_none());
    assert!(run.is_running());

    let fetched = registry.get(run.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, run.id);

    assert!(registry.get(9999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_second_concurrent_run_conflicts() {
    let pool = test_pool().await;
    let registry = RunRegistry::new(pool);

    let first = registry.create("fetch_category_subject").await.unwrap();

    let err = registry.create("fetch_category_subject").await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // A different pipeline type is unaffected
    registry.create("other_pipeline").await.unwrap();

    // Finishing the first run frees the slot
    registry
        .finalize(first.id, RunStatus::Finished, 10)
        .await
        .unwrap();
    registry.create("fetch_category_subject").await.unwrap();
}

#[tokio::test]
async fn test_finalize_records_duration_and_totals() {
    let pool = test_pool().await;
    let registry = RunRegistry::new(pool);

    let run = registry.create("fetch_category_subject").await.unwrap();
    let finalized = registry
        .finalize(run.id, RunStatus::Finished, 123)
        .await
        .unwrap();

    assert_eq!(finalized.status, "finished");
    assert_eq!(finalized.total_records, 123);
    assert!(finalized.end_time.is_some());

    // Duration is formatted as HH:MM:SS
    let duration = finalized.duration.unwrap();
    assert_eq!(duration.len(), 8);
    assert_eq!(duration.matches(':').count(), 2);

    assert!(!registry.is_running("fetch_category_subject").await.unwrap());
}

#[tokio::test]
async fn test_finalize_failed_run() {
    let pool = test_pool().await;
    let registry = RunRegistry::new(pool);

    let run = registry.create("fetch_category_subject").await.unwrap();
    let finalized = registry.finalize(run.id, RunStatus::Failed, 0).await.unwrap();

    assert_eq!(finalized.run_status(), Some(RunStatus::Failed));
    assert!(finalized.is_terminal());
}

#[tokio::test]
async fn test_latest_returns_newest_run() {
    let pool = test_pool().await;
    let registry = RunRegistry::new(pool);

    let first = registry.create("fetch_category_subject").await.unwrap();
    registry
        .finalize(first.id, RunStatus::Finished, 5)
        .await
        .unwrap();
    let second = registry.create("fetch_category_subject").await.unwrap();

    let latest = registry.latest("fetch_category_subject").await.unwrap().unwrap();
    assert_eq!(latest.id, second.id);

    assert!(registry.latest("unknown_pipeline").await.unwrap().is_none());
}

#[tokio::test]
async fn test_history_pages_newest_first() {
    let pool = test_pool().await;
    let registry = RunRegistry::new(pool);

    for _ in 0..5 {
        let run = registry.create("fetch_category_subject").await.unwrap();
        registry
            .finalize(run.id, RunStatus::Finished, 1)
            .await
            .unwrap();
    }

    let (page, total) = registry
        .history(Some("fetch_category_subject"), 2, 0)
        .await
        .unwrap();
    assert_eq!(total, 5);
    assert_eq!(page.len(), 2);
    assert!(page[0].id > page[1].id);

    let (page, total) = registry
        .history(Some("fetch_category_subject"), 2, 4)
        .await
        .unwrap();
    assert_eq!(total, 5);
    assert_eq!(page.len(), 1);

    // Unfiltered history covers all pipeline types
    let other = registry.create("other_pipeline").await.unwrap();
    registry
        .finalize(other.id, RunStatus::Failed, 0)
        .await
        .unwrap();

    let (_, total) = registry.history(None, 50, 0).await.unwrap();
    assert_eq!(total, 6);
}
