//! Database pool setup and schema bootstrap
//!
//! The run/event tables and report sinks are created idempotently at
//! startup; full migration tooling is intentionally out of scope.

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
    Executor,
};
use std::{str::FromStr, time::Duration};

use crate::config::DatabaseConfig;
use crate::error::AppResult;

/// Idempotent schema bootstrap statements.
///
/// The partial unique index on `pipeline_runs` enforces the one-running-run-
/// per-type invariant atomically: a second concurrent insert for the same
/// pipeline type fails with a unique violation instead of racing a
/// check-then-act sequence in application code.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS pipeline_runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        pipeline_type TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'running',
        start_time TEXT NOT NULL,
        end_time TEXT,
        duration TEXT,
        total_records INTEGER NOT NULL DEFAULT 0,
        last_offset INTEGER
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_pipeline_runs_one_running
        ON pipeline_runs (pipeline_type) WHERE status = 'running'
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pipeline_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id INTEGER NOT NULL REFERENCES pipeline_runs(id),
        level TEXT NOT NULL,
        message TEXT NOT NULL,
        progress INTEGER,
        timestamp TEXT NOT NULL,
        data TEXT
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_pipeline_events_run_id
        ON pipeline_events (run_id, id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS report_categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        category_id INTEGER NOT NULL UNIQUE,
        name TEXT,
        parent_id INTEGER,
        course_count INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS report_subjects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        subject_id INTEGER NOT NULL UNIQUE,
        category_id INTEGER,
        name TEXT,
        code TEXT
    )
    "#,
];

/// Connect to the database described by `config`
pub async fn connect(config: &DatabaseConfig) -> AppResult<SqlitePool> {
    let in_memory = config.url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    // An in-memory database exists per connection; a pool larger than one
    // would hand out empty databases.
    let max_connections = if in_memory { 1 } else { config.max_connections };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create tables and indexes if they do not exist yet
pub async fn init_schema(pool: &SqlitePool) -> AppResult<()> {
    for statement in SCHEMA {
        pool.execute(*statement).await?;
    }

    tracing::debug!("Database schema bootstrap completed");
    Ok(())
}
