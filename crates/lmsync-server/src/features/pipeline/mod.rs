//! Pipeline feature
//!
//! Trigger endpoints for the local sync pipeline and the two-phase
//! orchestration.

pub mod commands;
pub mod routes;

pub use routes::pipeline_routes;
