//! Trigger orchestration command
//!
//! Starts the two-phase upstream-then-local sync and returns the initial
//! session snapshot. The snapshot is the only view of the orchestration
//! itself; both phases remain observable through runs and logs.

use std::sync::Arc;

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::ingest::orchestrator::{OrchestratorConfig, Step, SyncOrchestrator};
use crate::ingest::upstream::{NumericStatusDiscriminator, TriggerParams, UpstreamClient};

/// Command to start a two-phase orchestration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TriggerOrchestrationCommand {
    #[serde(flatten)]
    pub params: TriggerParams,
}

/// Response for the orchestration command
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerOrchestrationResponse {
    pub success: bool,
    pub orchestration_id: Uuid,
    pub steps: Vec<Step>,
}

impl Request<AppResult<TriggerOrchestrationResponse>> for TriggerOrchestrationCommand {}

pub async fn handle(
    pool: SqlitePool,
    upstream: Arc<UpstreamClient>,
    config: OrchestratorConfig,
    command: TriggerOrchestrationCommand,
) -> AppResult<TriggerOrchestrationResponse> {
    let orchestrator = SyncOrchestrator::new(
        pool,
        upstream,
        Arc::new(NumericStatusDiscriminator::default()),
        config,
    );

    let (session, _handle) = orchestrator.start(command.params);

    tracing::info!(orchestration_id = %session.id, "Orchestration accepted");

    Ok(TriggerOrchestrationResponse {
        success: true,
        orchestration_id: session.id,
        steps: session.steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestration_response_uses_camel_case_keys() {
        let response = TriggerOrchestrationResponse {
            success: true,
            orchestration_id: Uuid::nil(),
            steps: vec![],
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("orchestrationId").is_some());
        assert!(json.get("steps").is_some());
    }
}
