//! Upstream reporting gateway client
//!
//! Thin HTTP client over the learning platform's export API: trigger an
//! export, poll its status, and fetch exported report rows. Network
//! failures and non-success responses map to upstream errors; they never
//! reach a trigger caller directly once a pipeline body is detached.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::error::{AppError, AppResult};

/// Parameters accepted by the trigger endpoints and forwarded upstream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<u32>,
}

/// Client for the upstream export API
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Trigger the upstream export pipeline
    pub async fn trigger_export(&self, params: &TriggerParams) -> AppResult<Value> {
        let url = format!("{}/etl/trigger", self.base_url);
        let response = self.http.post(&url).json(params).send().await?;
        Self::json_body(response).await
    }

    /// Poll the upstream export pipeline's status
    pub async fn export_status(&self) -> AppResult<Value> {
        let url = format!("{}/etl/status", self.base_url);
        let response = self.http.get(&url).send().await?;
        Self::json_body(response).await
    }

    /// Fetch exported category report rows
    pub async fn fetch_categories(&self) -> AppResult<Vec<Value>> {
        self.fetch_records("/export/categories").await
    }

    /// Fetch exported subject report rows
    pub async fn fetch_subjects(&self) -> AppResult<Vec<Value>> {
        self.fetch_records("/export/subjects").await
    }

    async fn fetch_records(&self, path: &str) -> AppResult<Vec<Value>> {
        let url = format!("{}{}", self.base_url, path);
        let body = Self::json_body(self.http.get(&url).send().await?).await?;

        body.as_array().cloned().ok_or_else(|| {
            AppError::Upstream(format!("expected a JSON array from {}", path))
        })
    }

    async fn json_body(response: reqwest::Response) -> AppResult<Value> {
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "upstream returned {} for {}",
                status,
                response.url()
            )));
        }

        Ok(response.json().await?)
    }
}

/// Result of interpreting one status poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Keep polling
    Pending,
    Succeeded,
    Failed(String),
}

/// Pipeline-specific interpretation of the upstream status payload
///
/// Different upstream pipelines signal completion differently (numeric
/// status codes, string enums); the orchestrator stays agnostic.
pub trait CompletionDiscriminator: Send + Sync {
    fn interpret(&self, body: &Value) -> PollOutcome;
}

/// Discriminator for numeric status codes
#[derive(Debug, Clone)]
pub struct NumericStatusDiscriminator {
    pub field: String,
    pub success_code: i64,
    pub failure_code: i64,
}

impl Default for NumericStatusDiscriminator {
    fn default() -> Self {
        Self {
            field: "status_code".to_string(),
            success_code: 2,
            failure_code: 3,
        }
    }
}

impl CompletionDiscriminator for NumericStatusDiscriminator {
    fn interpret(&self, body: &Value) -> PollOutcome {
        match body.get(&self.field).and_then(Value::as_i64) {
            Some(code) if code == self.success_code => PollOutcome::Succeeded,
            Some(code) if code == self.failure_code => PollOutcome::Failed(format!(
                "upstream reported failure code {}",
                code
            )),
            _ => PollOutcome::Pending,
        }
    }
}

/// Discriminator for string status enums
#[derive(Debug, Clone)]
pub struct StringStatusDiscriminator {
    pub field: String,
    pub success_value: String,
    pub failure_value: String,
}

impl CompletionDiscriminator for StringStatusDiscriminator {
    fn interpret(&self, body: &Value) -> PollOutcome {
        match body.get(&self.field).and_then(Value::as_str) {
            Some(value) if value == self.success_value => PollOutcome::Succeeded,
            Some(value) if value == self.failure_value => {
                PollOutcome::Failed(format!("upstream reported status '{}'", value))
            },
            _ => PollOutcome::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_discriminator() {
        let disc = NumericStatusDiscriminator::default();

        assert_eq!(disc.interpret(&json!({"status_code": 2})), PollOutcome::Succeeded);
        assert!(matches!(
            disc.interpret(&json!({"status_code": 3})),
            PollOutcome::Failed(_)
        ));
        assert_eq!(disc.interpret(&json!({"status_code": 1})), PollOutcome::Pending);
        assert_eq!(disc.interpret(&json!({})), PollOutcome::Pending);
        assert_eq!(
            disc.interpret(&json!({"status_code": "2"})),
            PollOutcome::Pending
        );
    }

    #[test]
    fn test_string_discriminator() {
        let disc = StringStatusDiscriminator {
            field: "state".to_string(),
            success_value: "completed".to_string(),
            failure_value: "failed".to_string(),
        };

        assert_eq!(
            disc.interpret(&json!({"state": "completed"})),
            PollOutcome::Succeeded
        );
        assert!(matches!(
            disc.interpret(&json!({"state": "failed"})),
            PollOutcome::Failed(_)
        ));
        assert_eq!(
            disc.interpret(&json!({"state": "running"})),
            PollOutcome::Pending
        );
    }

    #[test]
    fn test_trigger_params_serialization_skips_none() {
        let params = TriggerParams::default();
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, json!({}));

        let params = TriggerParams {
            start_date: Some("2024-01-01".to_string()),
            concurrency: Some(4),
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, json!({"start_date": "2024-01-01", "concurrency": 4}));
    }
}
