//! Events feature
//!
//! Paged event queries plus a live SSE stream per run.

pub mod queries;
pub mod routes;
pub mod stream;

pub use routes::events_routes;
