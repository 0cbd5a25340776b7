//! lmsync common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging setup for the lmsync workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the [`LmsyncError`] type shared across crates
//! - **Logging**: `tracing`-based logging initialization with console and
//!   file output, configured from the environment

pub mod error;
pub mod logging;

pub use error::{LmsyncError, Result};
