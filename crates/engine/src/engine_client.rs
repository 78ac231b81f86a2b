//! Workflow engine client.
//!
//! Talks to two surfaces of the engine:
//! - the registry, which catalogs workflow items (`/v1/workflow-items`)
//! - the per-workflow execution service recorded in each item's
//!   `serviceUrl`, which answers runtime introspection and runs executions
//!
//! Registry lookups return `Ok(None)` on 404 — an unknown workflow is data,
//! not an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowdesk_core::error::EngineError;
use flowdesk_core::{ExecutionRef, ProcessEngine, RuntimeInfo, WorkflowItem};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client for the workflow engine.
pub struct EngineClient {
    client: reqwest::Client,
    registry_url: String,
}

impl EngineClient {
    /// Create a client for the registry at `registry_url`.
    pub fn new(registry_url: impl Into<String>) -> Self {
        Self::with_timeout(registry_url, std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(registry_url: impl Into<String>, timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            registry_url: registry_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn transport_error(e: reqwest::Error) -> EngineError {
        if e.is_timeout() {
            EngineError::Timeout(e.to_string())
        } else {
            EngineError::Network(e.to_string())
        }
    }

    async fn api_error(response: reqwest::Response, context: &str) -> EngineError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        warn!(status, body = %body, "{context} failed");
        EngineError::Api {
            status_code: status,
            message: body,
        }
    }
}

#[async_trait]
impl ProcessEngine for EngineClient {
    async fn workflow_item(
        &self,
        workflow_id: &str,
    ) -> Result<Option<WorkflowItem>, EngineError> {
        let url = format!("{}/v1/workflow-items/{workflow_id}", self.registry_url);
        debug!(workflow_id = %workflow_id, "Fetching workflow item");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::api_error(response, "Workflow item lookup").await);
        }

        let doc: WorkflowItemDoc = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(format!("workflow item: {e}")))?;
        Ok(Some(doc.into()))
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowItem>, EngineError> {
        let url = format!("{}/v1/workflow-items", self.registry_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::api_error(response, "Workflow listing").await);
        }

        let doc: WorkflowItemListDoc = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(format!("workflow list: {e}")))?;
        Ok(doc.items.into_iter().map(WorkflowItem::from).collect())
    }

    async fn runtime_info(
        &self,
        workflow_id: &str,
        service_url: &str,
    ) -> Result<RuntimeInfo, EngineError> {
        let base = service_url.trim_end_matches('/');
        let url = format!("{base}/v1/workflows/{workflow_id}");
        debug!(workflow_id = %workflow_id, service_url = %base, "Fetching runtime info");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::api_error(response, "Runtime introspection").await);
        }

        let doc: RuntimeInfoDoc = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(format!("runtime info: {e}")))?;
        Ok(RuntimeInfo {
            input_schema: doc.input_schema,
        })
    }

    async fn start_execution(
        &self,
        item: &WorkflowItem,
        input: serde_json::Value,
    ) -> Result<ExecutionRef, EngineError> {
        let Some(service_url) = item.service_url.as_deref() else {
            return Err(EngineError::NoServiceUrl(item.id.clone()));
        };
        let base = service_url.trim_end_matches('/');
        let url = format!("{base}/v1/workflows/{}/executions", item.id);
        debug!(workflow_id = %item.id, "Starting execution");

        let response = self
            .client
            .post(&url)
            .json(&StartExecutionRequest { input })
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::api_error(response, "Execution start").await);
        }

        let doc: ExecutionStartedDoc = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(format!("execution start: {e}")))?;
        Ok(ExecutionRef {
            instance_id: doc.id,
            workflow_id: item.id.clone(),
            started_at: doc.started_at.unwrap_or_else(Utc::now),
        })
    }

    async fn abort_execution(
        &self,
        item: &WorkflowItem,
        instance_id: &str,
    ) -> Result<bool, EngineError> {
        let Some(service_url) = item.service_url.as_deref() else {
            return Err(EngineError::NoServiceUrl(item.id.clone()));
        };
        let base = service_url.trim_end_matches('/');
        let url = format!("{base}/v1/executions/{instance_id}");
        debug!(workflow_id = %item.id, instance_id = %instance_id, "Aborting execution");

        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if response.status().as_u16() == 404 {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(Self::api_error(response, "Execution abort").await);
        }
        Ok(true)
    }

    async fn health_check(&self) -> Result<bool, EngineError> {
        let url = format!("{}/v1/workflow-items", self.registry_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::transport_error)?;
        Ok(response.status().is_success())
    }
}

// --- Engine API types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowItemDoc {
    id: String,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    definition: serde_json::Value,
    #[serde(default)]
    service_url: Option<String>,
}

impl From<WorkflowItemDoc> for WorkflowItem {
    fn from(doc: WorkflowItemDoc) -> Self {
        WorkflowItem {
            id: doc.id,
            uri: doc.uri,
            name: doc.name,
            description: doc.description,
            definition: doc.definition,
            service_url: doc.service_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorkflowItemListDoc {
    #[serde(default)]
    items: Vec<WorkflowItemDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeInfoDoc {
    #[serde(default)]
    input_schema: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct StartExecutionRequest {
    input: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionStartedDoc {
    id: String,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_trims_trailing_slash() {
        let client = EngineClient::new("http://registry.local/");
        assert_eq!(client.registry_url, "http://registry.local");
    }

    #[test]
    fn parse_workflow_item_doc() {
        let doc: WorkflowItemDoc = serde_json::from_str(
            r#"{
                "id": "wf-onboarding",
                "uri": "workflows/wf-onboarding",
                "name": "Onboarding",
                "definition": {"steps": ["collect", "review"]},
                "serviceUrl": "http://engine.local:8200"
            }"#,
        )
        .unwrap();

        let item = WorkflowItem::from(doc);
        assert_eq!(item.id, "wf-onboarding");
        assert_eq!(item.uri.as_deref(), Some("workflows/wf-onboarding"));
        assert_eq!(item.service_url.as_deref(), Some("http://engine.local:8200"));
        assert_eq!(item.definition["steps"][0], "collect");
    }

    #[test]
    fn parse_workflow_item_doc_minimal() {
        let doc: WorkflowItemDoc = serde_json::from_str(r#"{"id": "wf-bare"}"#).unwrap();
        let item = WorkflowItem::from(doc);
        assert_eq!(item.id, "wf-bare");
        assert!(item.uri.is_none());
        assert!(item.service_url.is_none());
        assert!(item.definition.is_null());
    }

    #[test]
    fn parse_workflow_list_doc() {
        let doc: WorkflowItemListDoc = serde_json::from_str(
            r#"{"items": [{"id": "a"}, {"id": "b"}]}"#,
        )
        .unwrap();
        assert_eq!(doc.items.len(), 2);

        let empty: WorkflowItemListDoc = serde_json::from_str("{}").unwrap();
        assert!(empty.items.is_empty());
    }

    #[test]
    fn parse_runtime_info_doc() {
        let doc: RuntimeInfoDoc = serde_json::from_str(
            r#"{"inputSchema": {"properties": {"name": {"type": "string"}}}}"#,
        )
        .unwrap();
        assert!(doc.input_schema.is_some());

        let none: RuntimeInfoDoc = serde_json::from_str("{}").unwrap();
        assert!(none.input_schema.is_none());
    }

    #[test]
    fn parse_execution_started_doc() {
        let doc: ExecutionStartedDoc = serde_json::from_str(
            r#"{"id": "inst-42", "startedAt": "2026-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(doc.id, "inst-42");
        assert!(doc.started_at.is_some());

        let bare: ExecutionStartedDoc = serde_json::from_str(r#"{"id": "inst-7"}"#).unwrap();
        assert!(bare.started_at.is_none());
    }

    #[tokio::test]
    async fn start_execution_requires_service_url() {
        let client = EngineClient::new("http://registry.local");
        let item = WorkflowItem {
            id: "wf-1".into(),
            uri: Some("workflows/wf-1".into()),
            name: None,
            description: None,
            definition: serde_json::Value::Null,
            service_url: None,
        };

        let err = client
            .start_execution(&item, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoServiceUrl(ref id) if id == "wf-1"));
    }

    #[tokio::test]
    async fn abort_execution_requires_service_url() {
        let client = EngineClient::new("http://registry.local");
        let item = WorkflowItem {
            id: "wf-2".into(),
            uri: None,
            name: None,
            description: None,
            definition: serde_json::Value::Null,
            service_url: None,
        };

        let err = client.abort_execution(&item, "inst-1").await.unwrap_err();
        assert!(matches!(err, EngineError::NoServiceUrl(_)));
    }
}
