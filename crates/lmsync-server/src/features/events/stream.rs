//! Live event streaming
//!
//! Server-sent events for a single run. The stream opens with a
//! connection frame, replays a tail window of recent events, then polls
//! the event log on an interval and forwards anything appended after the
//! last id the client has seen. Once the run reaches a terminal status
//! the stream emits a closing frame and ends.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::stream::{self, Stream};
use serde_json::json;
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::ingest::events::{Event, EventLog};
use crate::ingest::registry::{RunRegistry, RunStatus};

/// How many recent events are replayed when a client connects
pub const STREAM_TAIL_WINDOW: i64 = 50;

/// One poll of the event log past the cursor
#[derive(Debug)]
pub struct StreamBatch {
    pub events: Vec<Event>,
    pub last_seen: i64,
    /// Set when the run has reached a terminal status
    pub terminal: Option<RunStatus>,
}

/// Fetch events appended after `last_seen` and check whether the run
/// has finished.
///
/// The terminal status is read after the events so that anything the
/// run logged before finalizing is delivered in the same batch.
pub async fn poll_new_events(
    log: &EventLog,
    registry: &RunRegistry,
    run_id: i64,
    last_seen: i64,
) -> AppResult<StreamBatch> {
    let events = log.since(run_id, last_seen).await?;
    let last_seen = events.iter().map(|e| e.id).max().unwrap_or(last_seen);

    let terminal = registry
        .get(run_id)
        .await?
        .and_then(|run| run.run_status())
        .filter(|status| status.is_terminal());

    Ok(StreamBatch {
        events,
        last_seen,
        terminal,
    })
}

fn connection_frame(run_id: i64) -> SseEvent {
    SseEvent::default().event("connection").data(
        json!({
            "message": "Connected to log stream",
            "log_id": run_id,
        })
        .to_string(),
    )
}

fn log_frame(event: &Event) -> SseEvent {
    SseEvent::default().event("log").data(
        json!({
            "id": event.id,
            "log_id": event.run_id,
            "timestamp": event.timestamp,
            "level": event.level,
            "message": event.message,
            "progress": event.progress,
        })
        .to_string(),
    )
}

fn completion_frame(run_id: i64, status: RunStatus) -> SseEvent {
    SseEvent::default().event("completion").data(
        json!({
            "log_id": run_id,
            "status": status.as_str(),
        })
        .to_string(),
    )
}

fn error_frame(message: &str) -> SseEvent {
    SseEvent::default()
        .event("error")
        .data(json!({ "message": message }).to_string())
}

struct Cursor {
    log: EventLog,
    registry: RunRegistry,
    run_id: i64,
    last_seen: i64,
    interval: Duration,
    pending: VecDeque<SseEvent>,
    done: bool,
}

/// Build the SSE response for a run
///
/// The caller is expected to have verified that the run exists.
pub async fn run_event_stream(
    pool: SqlitePool,
    run_id: i64,
    interval: Duration,
) -> AppResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    let log = EventLog::new(pool.clone());
    let registry = RunRegistry::new(pool);

    let tail = log.tail(run_id, STREAM_TAIL_WINDOW).await?;
    let last_seen = tail.iter().map(|e| e.id).max().unwrap_or(0);

    let mut pending = VecDeque::with_capacity(tail.len() + 1);
    pending.push_back(connection_frame(run_id));
    pending.extend(tail.iter().map(log_frame));

    let cursor = Cursor {
        log,
        registry,
        run_id,
        last_seen,
        interval,
        pending,
        done: false,
    };

    let stream = stream::unfold(cursor, |mut cursor| async move {
        loop {
            if let Some(frame) = cursor.pending.pop_front() {
                return Some((Ok(frame), cursor));
            }
            if cursor.done {
                return None;
            }

            tokio::time::sleep(cursor.interval).await;

            match poll_new_events(&cursor.log, &cursor.registry, cursor.run_id, cursor.last_seen)
                .await
            {
                Ok(batch) => {
                    cursor.last_seen = batch.last_seen;
                    cursor.pending.extend(batch.events.iter().map(log_frame));
                    if let Some(status) = batch.terminal {
                        cursor
                            .pending
                            .push_back(completion_frame(cursor.run_id, status));
                        cursor.done = true;
                    }
                }
                Err(e) => {
                    tracing::error!("Log stream poll failed for run {}: {}", cursor.run_id, e);
                    cursor.pending.push_back(error_frame("Log stream failed"));
                    cursor.done = true;
                }
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .text("keep-alive")
            .interval(Duration::from_secs(15)),
    ))
}
