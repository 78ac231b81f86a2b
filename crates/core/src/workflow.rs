//! Workflow engine and query-index traits — the abstractions over the
//! external orchestration services.
//!
//! `ProcessEngine` talks to the workflow registry and the per-workflow
//! execution endpoints; `InstanceIndex` talks to the secondary query index
//! that knows about running and finished process instances. The gateway and
//! the input-schema resolver call these traits without knowing which
//! implementation is behind them.

use crate::error::{EngineError, IndexError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A workflow as recorded by the engine's registry.
///
/// `uri` and `service_url` can be missing when the registry knows the
/// workflow but no execution endpoint has been recorded for it yet; the
/// input-schema resolver treats that as "not found".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowItem {
    /// Registry identifier of the workflow
    pub id: String,

    /// Canonical URI of the workflow definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// Human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// The definition document as the registry stores it
    pub definition: serde_json::Value,

    /// Base URL of the engine service that executes this workflow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
}

/// Live introspection result for one workflow.
///
/// A workflow that declares no input schema is a valid state, not an error:
/// it simply requires no form input to start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeInfo {
    /// The declared input schema, if the workflow has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
}

/// Reference to a started execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRef {
    /// Instance id assigned by the engine
    pub instance_id: String,

    /// The workflow this execution belongs to
    pub workflow_id: String,

    /// When the execution was accepted
    pub started_at: DateTime<Utc>,
}

/// Lifecycle state of a process instance as reported by the query index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Running,
    Completed,
    Aborted,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstanceState::Running => "running",
            InstanceState::Completed => "completed",
            InstanceState::Aborted => "aborted",
            InstanceState::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A process instance as the query index sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInstance {
    pub id: String,

    pub workflow_id: String,

    pub state: InstanceState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    /// Recorded variable snapshot, when the index has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<InstanceVariables>,
}

/// The variable snapshot of one process instance.
///
/// A nested key/value map; the form data the resolution core cares about
/// lives under one well-known top-level key (`flowdesk_schema::DATA_KEY`).
/// Absence of the whole snapshot is modeled as `Option<InstanceVariables>`
/// everywhere — never as an empty-vs-null ambiguity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceVariables(pub serde_json::Map<String, serde_json::Value>);

impl InstanceVariables {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for InstanceVariables {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

/// Filter for instance listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<InstanceState>,

    #[serde(default = "default_limit")]
    pub limit: u32,

    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

/// The workflow engine trait.
///
/// Covers the registry (workflow items) and the per-workflow execution
/// endpoints. Registry lookups return `Ok(None)` for unknown workflows —
/// absence is data, not an error.
#[async_trait]
pub trait ProcessEngine: Send + Sync {
    /// Fetch one workflow item from the registry.
    async fn workflow_item(
        &self,
        workflow_id: &str,
    ) -> Result<Option<WorkflowItem>, EngineError>;

    /// List all workflow items known to the registry.
    async fn list_workflows(&self) -> Result<Vec<WorkflowItem>, EngineError>;

    /// Live introspection of the engine service executing this workflow.
    async fn runtime_info(
        &self,
        workflow_id: &str,
        service_url: &str,
    ) -> Result<RuntimeInfo, EngineError>;

    /// Start a new execution of the workflow with the given input payload.
    async fn start_execution(
        &self,
        item: &WorkflowItem,
        input: serde_json::Value,
    ) -> Result<ExecutionRef, EngineError>;

    /// Abort a running execution. Returns `false` when the engine does not
    /// know the instance.
    async fn abort_execution(
        &self,
        item: &WorkflowItem,
        instance_id: &str,
    ) -> Result<bool, EngineError>;

    /// Health check — can we reach the registry?
    async fn health_check(&self) -> Result<bool, EngineError> {
        Ok(true)
    }
}

/// The secondary query index trait.
///
/// The resolution core depends on exactly one capability here: fetching the
/// variable snapshot of an instance. Listing and inspection serve the
/// façade's instance routes.
#[async_trait]
pub trait InstanceIndex: Send + Sync {
    /// Fetch the variable snapshot of one instance.
    ///
    /// `Ok(None)` covers both "instance unknown" and "instance has no
    /// recorded data yet".
    async fn instance_variables(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceVariables>, IndexError>;

    /// Fetch one instance for inspection.
    async fn get_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<ProcessInstance>, IndexError>;

    /// List instances matching the filter.
    async fn list_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<ProcessInstance>, IndexError>;

    /// Health check — can we reach the index?
    async fn health_check(&self) -> Result<bool, IndexError> {
        Ok(true)
    }
}
