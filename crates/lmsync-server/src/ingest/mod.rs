//! ETL core: run registry, event log, bulk ingestion, background
//! execution and two-phase orchestration
//!
//! Data flow: a trigger request asks the [`executor::PipelineExecutor`]
//! to detach a pipeline body; the body clears its report sinks, fetches
//! rows through the [`upstream::UpstreamClient`], and drives the
//! [`sink::BulkIngestor`], writing [`events`] throughout; the
//! [`registry`] record is finalized on both outcome paths. The
//! [`orchestrator`] wraps the upstream export pipeline and the local
//! pipeline behind one orchestration id.

pub mod events;
pub mod executor;
pub mod orchestrator;
pub mod pipeline;
pub mod registry;
pub mod sink;
pub mod upstream;

pub use events::{Event, EventLevel, EventLog};
pub use executor::PipelineExecutor;
pub use orchestrator::{OrchestratorConfig, SyncOrchestrator};
pub use registry::{Run, RunRegistry, RunStatus};
pub use sink::{BulkIngestor, ProgressRange, SinkTable};
pub use upstream::{TriggerParams, UpstreamClient};
