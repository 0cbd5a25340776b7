//! Pipeline feature commands

pub mod trigger_orchestration;
pub mod trigger_run;

pub use trigger_orchestration::TriggerOrchestrationCommand;
pub use trigger_run::TriggerRunCommand;
