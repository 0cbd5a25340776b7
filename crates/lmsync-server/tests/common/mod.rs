//! Common test utilities for lmsync-server integration tests
//!
//! Provides an in-memory SQLite pool with the schema bootstrapped, plus
//! helpers for pointing an upstream client at a wiremock server and
//! reading sink tables back.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use lmsync_server::config::{DatabaseConfig, UpstreamConfig};
use lmsync_server::db;
use lmsync_server::ingest::orchestrator::OrchestratorConfig;
use lmsync_server::ingest::UpstreamClient;
use sqlx::SqlitePool;

/// Fresh in-memory database with the schema applied
pub async fn test_pool() -> SqlitePool {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    };

    let pool = db::connect(&config).await.expect("connect in-memory db");
    db::init_schema(&pool).await.expect("bootstrap schema");
    pool
}

/// Upstream client pointed at a mock server
pub fn mock_upstream(base_url: &str) -> Arc<UpstreamClient> {
    let config = UpstreamConfig {
        base_url: base_url.to_string(),
        timeout_secs: 5,
    };

    Arc::new(UpstreamClient::new(&config).expect("build upstream client"))
}

/// Orchestrator config with millisecond polling for fast tests
pub fn fast_orchestrator(max_poll_attempts: u32) -> OrchestratorConfig {
    OrchestratorConfig {
        poll_interval: Duration::from_millis(10),
        max_poll_attempts,
    }
}

/// Row count of a sink table
pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("count rows")
}
