//! Query index client.
//!
//! The index is the read side of the orchestration platform: it knows about
//! running and finished process instances and their recorded variable
//! snapshots. The input-schema resolver only ever uses
//! [`IndexClient::instance_variables`]; the instance inspection routes of
//! the gateway use the rest.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowdesk_core::error::IndexError;
use flowdesk_core::{
    InstanceFilter, InstanceIndex, InstanceState, InstanceVariables, ProcessInstance,
};
use serde::Deserialize;
use tracing::debug;

const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// HTTP client for the process-instance query index.
pub struct IndexClient {
    client: reqwest::Client,
    base_url: String,
}

impl IndexClient {
    /// Create a client for the index at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_instance(&self, instance_id: &str) -> Result<Option<InstanceDoc>, IndexError> {
        let url = format!("{}/v1/instances/{instance_id}", self.base_url);
        debug!(instance_id = %instance_id, "Fetching instance from index");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| IndexError::Network(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Api {
                status_code: status,
                message: body,
            });
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| IndexError::InvalidResponse(format!("instance: {e}")))
    }
}

#[async_trait]
impl InstanceIndex for IndexClient {
    async fn instance_variables(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceVariables>, IndexError> {
        // An instance without a recorded snapshot resolves to None, same as
        // an unknown instance.
        Ok(self
            .fetch_instance(instance_id)
            .await?
            .and_then(|doc| doc.variables))
    }

    async fn get_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<ProcessInstance>, IndexError> {
        Ok(self
            .fetch_instance(instance_id)
            .await?
            .map(ProcessInstance::from))
    }

    async fn list_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<ProcessInstance>, IndexError> {
        let url = format!("{}/v1/instances", self.base_url);

        let mut query: Vec<(&str, String)> = vec![
            ("limit", filter.limit.to_string()),
            ("offset", filter.offset.to_string()),
        ];
        if let Some(ref workflow_id) = filter.workflow_id {
            query.push(("workflowId", workflow_id.clone()));
        }
        if let Some(state) = filter.state {
            query.push(("state", state.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| IndexError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Api {
                status_code: status,
                message: body,
            });
        }

        let doc: InstanceListDoc = response
            .json()
            .await
            .map_err(|e| IndexError::InvalidResponse(format!("instance list: {e}")))?;
        Ok(doc.items.into_iter().map(ProcessInstance::from).collect())
    }

    async fn health_check(&self) -> Result<bool, IndexError> {
        let url = format!("{}/v1/instances", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("limit", "1")])
            .send()
            .await
            .map_err(|e| IndexError::Network(e.to_string()))?;
        Ok(response.status().is_success())
    }
}

// --- Index API types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceDoc {
    id: String,
    workflow_id: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    variables: Option<InstanceVariables>,
}

impl From<InstanceDoc> for ProcessInstance {
    fn from(doc: InstanceDoc) -> Self {
        ProcessInstance {
            id: doc.id,
            workflow_id: doc.workflow_id,
            state: doc.state.as_deref().map_or(InstanceState::Unknown, parse_state),
            started_at: doc.started_at,
            ended_at: doc.ended_at,
            variables: doc.variables,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InstanceListDoc {
    #[serde(default)]
    items: Vec<InstanceDoc>,
}

/// The index reports states in a few spellings depending on its version.
fn parse_state(s: &str) -> InstanceState {
    match s.to_ascii_lowercase().as_str() {
        "running" | "active" => InstanceState::Running,
        "completed" | "ended" => InstanceState::Completed,
        "aborted" | "cancelled" => InstanceState::Aborted,
        _ => InstanceState::Unknown,
    }
}
