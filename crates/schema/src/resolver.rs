//! Input-schema resolution — collaborator I/O plus the pure pipeline.
//!
//! The resolver is the only component here that performs I/O. It fetches the
//! workflow item and its live runtime schema, runs the pure parse → extract
//! → merge steps, and assembles the response. Each resolution is
//! request-scoped and holds no state between calls.

use std::sync::Arc;

use flowdesk_core::{InstanceIndex, InstanceVariables, ProcessEngine, ResolveError};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::compose::{SchemaFragment, parse_fragments};
use crate::initial::{InitialState, extract};
use crate::merge::{MergedState, merge};

/// Workflow identity carried in the response.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowItemRef {
    pub uri: String,
    pub definition: Value,
}

/// Aggregate output of one resolution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDataInputSchemaResponse {
    pub workflow_item: WorkflowItemRef,

    /// Ordered form fragments, one per schema composition member
    pub schemas: Vec<SchemaFragment>,

    pub initial_state: MergedState,
}

/// Resolves the input schema and pre-filled state for starting or resuming
/// a workflow.
pub struct InputSchemaResolver {
    engine: Arc<dyn ProcessEngine>,
    index: Arc<dyn InstanceIndex>,
}

impl InputSchemaResolver {
    pub fn new(engine: Arc<dyn ProcessEngine>, index: Arc<dyn InstanceIndex>) -> Self {
        Self { engine, index }
    }

    /// Resolve the form a user must fill in for `workflow_id`.
    ///
    /// `instance_id` names the primary instance whose recorded data pre-fills
    /// the form; `assessment_instance_id` names a related instance whose data
    /// is copied in read-only when the primary knows nothing. Either lookup
    /// may come back empty or fail without failing the request; a missing
    /// workflow, unreachable engine, or malformed schema fails it.
    pub async fn resolve(
        &self,
        workflow_id: &str,
        instance_id: Option<&str>,
        assessment_instance_id: Option<&str>,
    ) -> Result<WorkflowDataInputSchemaResponse, ResolveError> {
        let item = self
            .engine
            .workflow_item(workflow_id)
            .await
            .map_err(|e| ResolveError::EngineUnavailable {
                reason: e.to_string(),
            })?
            .ok_or_else(|| ResolveError::WorkflowNotFound {
                workflow_id: workflow_id.to_string(),
            })?;

        // A registry entry without a uri or execution endpoint cannot be
        // started, so it counts as not found.
        let (Some(uri), Some(service_url)) = (item.uri.clone(), item.service_url.clone()) else {
            return Err(ResolveError::WorkflowNotFound {
                workflow_id: workflow_id.to_string(),
            });
        };
        let workflow_item = WorkflowItemRef {
            uri,
            definition: item.definition.clone(),
        };

        let runtime = self
            .engine
            .runtime_info(workflow_id, &service_url)
            .await
            .map_err(|e| ResolveError::EngineUnavailable {
                reason: e.to_string(),
            })?;

        // No declared input schema means no form is needed. That is a valid
        // response, not an error.
        let Some(raw_schema) = runtime.input_schema else {
            debug!(workflow_id = %workflow_id, "Workflow declares no input schema");
            return Ok(WorkflowDataInputSchemaResponse {
                workflow_item,
                schemas: Vec::new(),
                initial_state: MergedState::blank(0),
            });
        };

        let fragments = parse_fragments(&raw_schema)?;

        // The two instance lookups are independent; issue them concurrently.
        let (primary_vars, assessment_vars) = tokio::join!(
            self.fetch_variables(instance_id, "primary"),
            self.fetch_variables(assessment_instance_id, "assessment"),
        );

        let primary = extract(&fragments, primary_vars.as_ref());
        let assessment = assessment_instance_id.map(|_| extract(&fragments, assessment_vars.as_ref()));
        let initial_state = merge(primary, assessment);

        debug!(
            workflow_id = %workflow_id,
            fragments = fragments.len(),
            readonly_keys = initial_state.readonly_keys.len(),
            "Resolved input schema"
        );

        Ok(WorkflowDataInputSchemaResponse {
            workflow_item,
            schemas: fragments,
            initial_state,
        })
    }

    /// Fetch the variable snapshot for one role, absorbing absence.
    ///
    /// Both "no such instance / no data" and a failed index call degrade to
    /// `None`; neither may fail the resolution.
    async fn fetch_variables(
        &self,
        instance_id: Option<&str>,
        role: &'static str,
    ) -> Option<InstanceVariables> {
        let id = instance_id?;
        match self.index.instance_variables(id).await {
            Ok(Some(vars)) => Some(vars),
            Ok(None) => {
                info!(instance_id = %id, role, "Instance has no recorded variables");
                None
            }
            Err(e) => {
                warn!(instance_id = %id, role, error = %e, "Instance variable lookup failed, continuing without its data");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdesk_core::{EngineError, ExecutionRef, IndexError, InstanceFilter, ProcessInstance, RuntimeInfo, WorkflowItem};
    use serde_json::{Map, json};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// An engine stub serving one registry entry and a fixed runtime answer.
    struct MockEngine {
        item: Option<WorkflowItem>,
        runtime: Result<RuntimeInfo, EngineError>,
        runtime_calls: AtomicUsize,
    }

    impl MockEngine {
        fn new(item: Option<WorkflowItem>, runtime: Result<RuntimeInfo, EngineError>) -> Self {
            Self {
                item,
                runtime,
                runtime_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ProcessEngine for MockEngine {
        async fn workflow_item(
            &self,
            _workflow_id: &str,
        ) -> Result<Option<WorkflowItem>, EngineError> {
            Ok(self.item.clone())
        }

        async fn list_workflows(&self) -> Result<Vec<WorkflowItem>, EngineError> {
            Ok(self.item.clone().into_iter().collect())
        }

        async fn runtime_info(
            &self,
            _workflow_id: &str,
            _service_url: &str,
        ) -> Result<RuntimeInfo, EngineError> {
            self.runtime_calls.fetch_add(1, Ordering::SeqCst);
            self.runtime.clone()
        }

        async fn start_execution(
            &self,
            _item: &WorkflowItem,
            _input: serde_json::Value,
        ) -> Result<ExecutionRef, EngineError> {
            unimplemented!("not exercised by resolver tests")
        }

        async fn abort_execution(
            &self,
            _item: &WorkflowItem,
            _instance_id: &str,
        ) -> Result<bool, EngineError> {
            unimplemented!("not exercised by resolver tests")
        }
    }

    /// An index stub with per-instance variable snapshots.
    struct MockIndex {
        variables: HashMap<String, InstanceVariables>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl MockIndex {
        fn empty() -> Self {
            Self {
                variables: HashMap::new(),
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn with(instance_id: &str, data: serde_json::Value) -> Self {
            let mut index = Self::empty();
            index.add(instance_id, data);
            index
        }

        fn add(&mut self, instance_id: &str, data: serde_json::Value) {
            let mut map = Map::new();
            map.insert("data".to_string(), data);
            self.variables
                .insert(instance_id.to_string(), InstanceVariables(map));
        }

        fn failing() -> Self {
            Self {
                variables: HashMap::new(),
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl InstanceIndex for MockIndex {
        async fn instance_variables(
            &self,
            instance_id: &str,
        ) -> Result<Option<InstanceVariables>, IndexError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(IndexError::Network("connection refused".into()));
            }
            Ok(self.variables.get(instance_id).cloned())
        }

        async fn get_instance(
            &self,
            _instance_id: &str,
        ) -> Result<Option<ProcessInstance>, IndexError> {
            unimplemented!("not exercised by resolver tests")
        }

        async fn list_instances(
            &self,
            _filter: &InstanceFilter,
        ) -> Result<Vec<ProcessInstance>, IndexError> {
            unimplemented!("not exercised by resolver tests")
        }
    }

    fn item() -> WorkflowItem {
        WorkflowItem {
            id: "wf-1".into(),
            uri: Some("workflows/wf-1".into()),
            name: Some("Onboarding".into()),
            description: None,
            definition: json!({"kind": "process"}),
            service_url: Some("http://engine.local".into()),
        }
    }

    fn two_step_schema() -> serde_json::Value {
        json!({
            "allOf": [
                {"$ref": "#/definitions/personal"},
                {"$ref": "#/definitions/contact"}
            ],
            "definitions": {
                "personal": {"properties": {"name": {}, "age": {}}},
                "contact": {"properties": {"email": {}}}
            }
        })
    }

    fn resolver(engine: MockEngine, index: MockIndex) -> (InputSchemaResolver, Arc<MockEngine>, Arc<MockIndex>) {
        let engine = Arc::new(engine);
        let index = Arc::new(index);
        (
            InputSchemaResolver::new(engine.clone(), index.clone()),
            engine,
            index,
        )
    }

    #[tokio::test]
    async fn unknown_workflow_is_not_found() {
        let engine = MockEngine::new(None, Ok(RuntimeInfo::default()));
        let (resolver, engine, index) = resolver(engine, MockIndex::empty());

        let err = resolver.resolve("wf-missing", None, None).await.unwrap_err();
        assert!(matches!(err, ResolveError::WorkflowNotFound { ref workflow_id } if workflow_id == "wf-missing"));

        // The request died at the registry; nothing else was called.
        assert_eq!(engine.runtime_calls.load(Ordering::SeqCst), 0);
        assert_eq!(index.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_service_url_is_not_found() {
        let mut item = item();
        item.service_url = None;
        let engine = MockEngine::new(Some(item), Ok(RuntimeInfo::default()));
        let (resolver, engine, _) = resolver(engine, MockIndex::empty());

        let err = resolver.resolve("wf-1", None, None).await.unwrap_err();
        assert!(matches!(err, ResolveError::WorkflowNotFound { .. }));
        assert_eq!(engine.runtime_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn engine_failure_is_unavailable() {
        let engine = MockEngine::new(
            Some(item()),
            Err(EngineError::Network("engine down".into())),
        );
        let (resolver, _, _) = resolver(engine, MockIndex::empty());

        let err = resolver.resolve("wf-1", None, None).await.unwrap_err();
        assert!(matches!(err, ResolveError::EngineUnavailable { ref reason } if reason.contains("engine down")));
    }

    #[tokio::test]
    async fn no_input_schema_returns_empty_response() {
        let engine = MockEngine::new(Some(item()), Ok(RuntimeInfo::default()));
        let (resolver, _, index) = resolver(engine, MockIndex::empty());

        let response = resolver
            .resolve("wf-1", Some("inst-1"), Some("inst-2"))
            .await
            .unwrap();

        assert_eq!(response.workflow_item.uri, "workflows/wf-1");
        assert!(response.schemas.is_empty());
        assert!(response.initial_state.values.0.is_empty());
        assert!(response.initial_state.readonly_keys.is_empty());
        // With no schema there is nothing to pre-fill; no variable lookups.
        assert_eq!(index.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn primary_instance_data_prefills_the_form() {
        let engine = MockEngine::new(
            Some(item()),
            Ok(RuntimeInfo {
                input_schema: Some(two_step_schema()),
            }),
        );
        let mut index = MockIndex::with("inst-1", json!({"name": "Ann"}));
        index.add("inst-2", json!({"name": "Ann", "age": 30, "email": "a@x.com"}));
        let (resolver, _, index) = resolver(engine, index);

        let response = resolver
            .resolve("wf-1", Some("inst-1"), Some("inst-2"))
            .await
            .unwrap();

        assert_eq!(response.schemas.len(), 2);
        let body = serde_json::to_value(&response.initial_state).unwrap();
        assert_eq!(body["values"], json!([{"name": "Ann"}, {}]));
        assert_eq!(body["readonlyKeys"], json!([]));
        // Both lookups ran even though the assessment lost.
        assert_eq!(index.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn blank_primary_falls_back_to_readonly_assessment() {
        let engine = MockEngine::new(
            Some(item()),
            Ok(RuntimeInfo {
                input_schema: Some(two_step_schema()),
            }),
        );
        let index = MockIndex::with("inst-2", json!({"age": 30, "email": "a@x.com"}));
        let (resolver, _, _) = resolver(engine, index);

        let response = resolver
            .resolve("wf-1", Some("inst-1"), Some("inst-2"))
            .await
            .unwrap();

        let body = serde_json::to_value(&response.initial_state).unwrap();
        assert_eq!(body["values"], json!([{"age": 30}, {"email": "a@x.com"}]));
        assert_eq!(body["readonlyKeys"], json!(["age", "email"]));
    }

    #[tokio::test]
    async fn no_instance_ids_yield_blank_state_without_lookups() {
        let engine = MockEngine::new(
            Some(item()),
            Ok(RuntimeInfo {
                input_schema: Some(two_step_schema()),
            }),
        );
        let (resolver, _, index) = resolver(engine, MockIndex::empty());

        let response = resolver.resolve("wf-1", None, None).await.unwrap();

        assert_eq!(response.initial_state.values.0.len(), 2);
        assert!(response.initial_state.values.is_blank());
        assert!(response.initial_state.readonly_keys.is_empty());
        assert_eq!(index.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_index_lookup_degrades_to_blank_state() {
        let engine = MockEngine::new(
            Some(item()),
            Ok(RuntimeInfo {
                input_schema: Some(two_step_schema()),
            }),
        );
        let (resolver, _, _) = resolver(engine, MockIndex::failing());

        let response = resolver
            .resolve("wf-1", Some("inst-1"), Some("inst-2"))
            .await
            .unwrap();

        assert!(response.initial_state.values.is_blank());
        assert!(response.initial_state.readonly_keys.is_empty());
    }

    #[tokio::test]
    async fn malformed_schema_is_fatal() {
        let engine = MockEngine::new(
            Some(item()),
            Ok(RuntimeInfo {
                input_schema: Some(json!({"allOf": [{"title": "no fields"}]})),
            }),
        );
        let (resolver, _, _) = resolver(engine, MockIndex::empty());

        let err = resolver.resolve("wf-1", None, None).await.unwrap_err();
        assert!(matches!(err, ResolveError::Schema(_)));
    }

    #[tokio::test]
    async fn response_serializes_with_camel_case_envelope() {
        let engine = MockEngine::new(
            Some(item()),
            Ok(RuntimeInfo {
                input_schema: Some(json!({"properties": {"name": {"type": "string"}}})),
            }),
        );
        let (resolver, _, _) = resolver(engine, MockIndex::empty());

        let response = resolver.resolve("wf-1", None, None).await.unwrap();
        let body = serde_json::to_value(&response).unwrap();

        assert_eq!(body["workflowItem"]["uri"], "workflows/wf-1");
        assert_eq!(body["schemas"][0]["id"], "input");
        assert_eq!(body["initialState"]["values"], json!([{}]));
        assert_eq!(body["initialState"]["readonlyKeys"], json!([]));
    }
}
