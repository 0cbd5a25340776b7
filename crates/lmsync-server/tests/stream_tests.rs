//! Event stream cursor tests
//!
//! The SSE endpoint is a thin frame layer over `poll_new_events`; these
//! tests pin down the cursor, batching and terminal detection semantics.

mod common;

use common::test_pool;
use lmsync_server::features::events::stream::{poll_new_events, STREAM_TAIL_WINDOW};
use lmsync_server::ingest::events::{EventLevel, EventLog};
use lmsync_server::ingest::registry::{RunRegistry, RunStatus};

#[tokio::test]
async fn test_poll_advances_cursor_and_delivers_once() {
    let pool = test_pool().await;
    let registry = RunRegistry::new(pool.clone());
    let log = EventLog::new(pool);

    let run = registry.create("fetch_category_subject").await.unwrap();
    log.append(run.id, EventLevel::Info, "one", None, None)
        .await
        .unwrap();
    log.append(run.id, EventLevel::Info, "two", None, None)
        .await
        .unwrap();

    let batch = poll_new_events(&log, &registry, run.id, 0).await.unwrap();
    assert_eq!(batch.events.len(), 2);
    assert!(batch.terminal.is_none());

    // Nothing new: the cursor holds and no events repeat
    let next = poll_new_events(&log, &registry, run.id, batch.last_seen)
        .await
        .unwrap();
    assert!(next.events.is_empty());
    assert_eq!(next.last_seen, batch.last_seen);

    // New appends arrive exactly once
    log.append(run.id, EventLevel::Info, "three", None, None)
        .await
        .unwrap();
    let next = poll_new_events(&log, &registry, run.id, batch.last_seen)
        .await
        .unwrap();
    assert_eq!(next.events.len(), 1);
    assert_eq!(next.events[0].message, "three");
}

#[tokio::test]
async fn test_terminal_run_is_reported_with_final_events() {
    let pool = test_pool().await;
    let registry = RunRegistry::new(pool.clone());
    let log = EventLog::new(pool);

    let run = registry.create("fetch_category_subject").await.unwrap();
    log.append(run.id, EventLevel::Info, "done", Some(100), None)
        .await
        .unwrap();
    registry
        .finalize(run.id, RunStatus::Finished, 5)
        .await
        .unwrap();

    // The last events and the terminal status land in the same batch
    let batch = poll_new_events(&log, &registry, run.id, 0).await.unwrap();
    assert_eq!(batch.events.len(), 1);
    assert_eq!(batch.terminal, Some(RunStatus::Finished));
}

#[tokio::test]
async fn test_failed_run_reports_failed_terminal() {
    let pool = test_pool().await;
    let registry = RunRegistry::new(pool.clone());
    let log = EventLog::new(pool);

    let run = registry.create("fetch_category_subject").await.unwrap();
    registry.finalize(run.id, RunStatus::Failed, 0).await.unwrap();

    let batch = poll_new_events(&log, &registry, run.id, 0).await.unwrap();
    assert_eq!(batch.terminal, Some(RunStatus::Failed));
}

#[tokio::test]
async fn test_tail_window_bounds_replay() {
    let pool = test_pool().await;
    let registry = RunRegistry::new(pool.clone());
    let log = EventLog::new(pool);

    let run = registry.create("fetch_category_subject").await.unwrap();
    for i in 0..STREAM_TAIL_WINDOW + 10 {
        log.append(run.id, EventLevel::Debug, &format!("event {}", i), None, None)
            .await
            .unwrap();
    }

    let tail = log.tail(run.id, STREAM_TAIL_WINDOW).await.unwrap();
    assert_eq!(tail.len() as i64, STREAM_TAIL_WINDOW);
    // The window holds the newest events, oldest first
    assert_eq!(tail.last().unwrap().message, "event 59");
}
