//! LMS Sync Server Library
//!
//! HTTP server that mirrors LMS report data into a local reporting
//! database and exposes run tracking over it.
//!
//! # Overview
//!
//! - **Pipeline triggers**: start the local sync or the two-phase
//!   orchestration, both detached from the request
//! - **Run tracking**: one row per pipeline invocation with status,
//!   duration and record counts
//! - **Event log**: append-only per-run diagnostics, paged or streamed
//!   live over SSE
//! - **Bulk ingestion**: chunked writes with idempotent deduplication
//!
//! # Architecture
//!
//! The HTTP surface follows a **CQRS (Command Query Responsibility
//! Segregation)** layout: each feature is a vertical slice with its own
//! commands, queries and routes, while the ETL core lives under
//! [`ingest`].
//!
//! ## Framework Stack
//!
//! - **Axum**: Modern, ergonomic web framework
//! - **SQLx**: Async SQL over SQLite
//! - **Tower**: Middleware and service abstractions

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;

// Re-export commonly used types
pub use error::{AppError, AppResult};
