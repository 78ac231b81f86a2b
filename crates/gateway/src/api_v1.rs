//! HTTP API v1 — the workflow orchestration façade.
//!
//! Endpoints:
//!
//! - `GET    /v1/workflows`                           — List workflow items
//! - `GET    /v1/workflows/:id`                       — Get one workflow item
//! - `GET    /v1/workflows/:id/inputSchema`           — Resolve the start form
//! - `POST   /v1/workflows/:id/executions`            — Start an execution
//! - `GET    /v1/instances`                           — List process instances
//! - `GET    /v1/instances/:id`                       — Inspect one instance
//! - `DELETE /v1/instances/:id`                       — Abort a running instance
//! - `GET    /v1/notifications`                       — List the caller's notifications
//! - `GET    /v1/notifications/count`                 — The caller's unread count
//! - `POST   /v1/notifications`                       — Create a notification
//! - `POST   /v1/notifications/:id/read`              — Mark one notification read
//! - `POST   /v1/notifications/read-all`              — Mark the caller's set read
//! - `GET    /v1/status`                              — Gateway status summary
//!
//! Callers of the notification routes identify themselves with an
//! `X-User-Id` header; the directory expands it into the visible scope.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use flowdesk_core::directory::Directory;
use flowdesk_core::error::{DirectoryError, EngineError, IndexError, NotifyError, ResolveError};
use flowdesk_core::notification::{
    Audience, NewNotification, Notification, NotificationFilter, NotificationStore, RecipientScope,
};
use flowdesk_core::workflow::{
    InstanceFilter, InstanceIndex, InstanceState, InstanceVariables, ProcessEngine,
    ProcessInstance, WorkflowItem,
};
use flowdesk_schema::{InputSchemaResolver, WorkflowDataInputSchemaResponse};

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub engine: Arc<dyn ProcessEngine>,
    pub index: Arc<dyn InstanceIndex>,
    pub directory: Arc<dyn Directory>,
    pub notifications: Arc<dyn NotificationStore>,
    pub resolver: InputSchemaResolver,
    pub config: flowdesk_config::AppConfig,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

pub type SharedApiState = Arc<ApiV1State>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/workflows", get(list_workflows_handler))
        .route("/workflows/{workflow_id}", get(get_workflow_handler))
        .route(
            "/workflows/{workflow_id}/inputSchema",
            get(input_schema_handler),
        )
        .route(
            "/workflows/{workflow_id}/executions",
            post(start_execution_handler),
        )
        .route("/instances", get(list_instances_handler))
        .route("/instances/{instance_id}", get(get_instance_handler))
        .route(
            "/instances/{instance_id}",
            axum::routing::delete(abort_instance_handler),
        )
        .route("/notifications", get(list_notifications_handler))
        .route("/notifications", post(create_notification_handler))
        .route("/notifications/count", get(notification_count_handler))
        .route("/notifications/{id}/read", post(mark_read_handler))
        .route("/notifications/read-all", post(mark_all_read_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputSchemaQuery {
    /// Primary instance whose recorded data pre-fills the form.
    #[serde(default)]
    instance_id: Option<String>,
    /// Related instance whose data is copied in read-only as a fallback.
    #[serde(default)]
    assessment_instance_id: Option<String>,
}

#[derive(Deserialize)]
struct StartExecutionRequest {
    /// Form data the new execution starts with.
    #[serde(default = "default_input")]
    input: serde_json::Value,
}

fn default_input() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionStartedResponse {
    instance_id: String,
    workflow_id: String,
    started_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowSummaryDto {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct WorkflowListResponse {
    workflows: Vec<WorkflowSummaryDto>,
    count: usize,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowItemDto {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    definition: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    service_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListInstancesQuery {
    #[serde(default)]
    workflow_id: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

fn default_limit() -> u32 {
    50
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceDto {
    id: String,
    workflow_id: String,
    state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ended_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    variables: Option<InstanceVariables>,
}

#[derive(Serialize, Deserialize)]
struct InstanceListResponse {
    instances: Vec<InstanceDto>,
    count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListNotificationsQuery {
    #[serde(default)]
    unread_only: bool,
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

#[derive(Deserialize)]
struct CreateNotificationRequest {
    /// User id the notification is addressed to.
    #[serde(default)]
    recipient: Option<String>,
    /// Directory group the notification is addressed to.
    #[serde(default)]
    group: Option<String>,
    subject: String,
    body: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationDto {
    id: String,
    /// "user" or "group"
    kind: String,
    recipient: String,
    subject: String,
    body: String,
    read: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    read_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Serialize, Deserialize)]
struct NotificationListResponse {
    notifications: Vec<NotificationDto>,
    count: usize,
}

#[derive(Serialize, Deserialize)]
struct UnreadCountResponse {
    unread: u64,
}

#[derive(Serialize, Deserialize)]
struct MarkReadResponse {
    id: String,
    read: bool,
}

#[derive(Serialize, Deserialize)]
struct MarkAllReadResponse {
    updated: u64,
}

#[derive(Serialize, Deserialize)]
struct StatusResponse {
    status: String,
    version: String,
    uptime_secs: u64,
    engine_url: String,
    index_url: String,
    directory_url: String,
    notifications_backend: String,
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl From<WorkflowItem> for WorkflowSummaryDto {
    fn from(item: WorkflowItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            description: item.description,
        }
    }
}

impl From<WorkflowItem> for WorkflowItemDto {
    fn from(item: WorkflowItem) -> Self {
        Self {
            id: item.id,
            uri: item.uri,
            name: item.name,
            description: item.description,
            definition: item.definition,
            service_url: item.service_url,
        }
    }
}

impl From<ProcessInstance> for InstanceDto {
    fn from(instance: ProcessInstance) -> Self {
        Self {
            id: instance.id,
            workflow_id: instance.workflow_id,
            state: instance.state.to_string(),
            started_at: instance.started_at,
            ended_at: instance.ended_at,
            variables: instance.variables,
        }
    }
}

impl From<Notification> for NotificationDto {
    fn from(n: Notification) -> Self {
        let kind = match &n.audience {
            Audience::User(_) => "user",
            Audience::Group(_) => "group",
        };
        Self {
            id: n.id,
            kind: kind.into(),
            recipient: n.audience.id().to_string(),
            subject: n.subject,
            body: n.body,
            read: n.read,
            created_at: n.created_at,
            read_at: n.read_at,
        }
    }
}

// ── Workflow handlers ─────────────────────────────────────────────────────

async fn list_workflows_handler(
    State(state): State<SharedApiState>,
) -> Result<Json<WorkflowListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let items = state.engine.list_workflows().await.map_err(engine_error)?;

    let workflows: Vec<WorkflowSummaryDto> =
        items.into_iter().map(WorkflowSummaryDto::from).collect();

    Ok(Json(WorkflowListResponse {
        count: workflows.len(),
        workflows,
    }))
}

async fn get_workflow_handler(
    State(state): State<SharedApiState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<WorkflowItemDto>, (StatusCode, Json<ErrorResponse>)> {
    let item = state
        .engine
        .workflow_item(&workflow_id)
        .await
        .map_err(engine_error)?;

    match item {
        Some(item) => Ok(Json(item.into())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Workflow not found: {workflow_id}"),
            }),
        )),
    }
}

/// `GET /v1/workflows/:id/inputSchema` — resolve the form a user must fill
/// in to start or resume the workflow.
async fn input_schema_handler(
    State(state): State<SharedApiState>,
    Path(workflow_id): Path<String>,
    Query(query): Query<InputSchemaQuery>,
) -> Result<Json<WorkflowDataInputSchemaResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!(workflow_id = %workflow_id, "v1 inputSchema request");

    let resolved = state
        .resolver
        .resolve(
            &workflow_id,
            query.instance_id.as_deref(),
            query.assessment_instance_id.as_deref(),
        )
        .await
        .map_err(resolve_error)?;

    Ok(Json(resolved))
}

async fn start_execution_handler(
    State(state): State<SharedApiState>,
    Path(workflow_id): Path<String>,
    Json(payload): Json<StartExecutionRequest>,
) -> Result<(StatusCode, Json<ExecutionStartedResponse>), (StatusCode, Json<ErrorResponse>)> {
    let item = state
        .engine
        .workflow_item(&workflow_id)
        .await
        .map_err(engine_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Workflow not found: {workflow_id}"),
                }),
            )
        })?;

    let execution = state
        .engine
        .start_execution(&item, payload.input)
        .await
        .map_err(engine_error)?;

    info!(
        workflow_id = %workflow_id,
        instance_id = %execution.instance_id,
        "Execution started"
    );

    Ok((
        StatusCode::CREATED,
        Json(ExecutionStartedResponse {
            instance_id: execution.instance_id,
            workflow_id: execution.workflow_id,
            started_at: execution.started_at,
        }),
    ))
}

// ── Instance handlers ─────────────────────────────────────────────────────

async fn list_instances_handler(
    State(state): State<SharedApiState>,
    Query(query): Query<ListInstancesQuery>,
) -> Result<Json<InstanceListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let state_filter = match query.state.as_deref() {
        Some(s) => Some(parse_instance_state(s)?),
        None => None,
    };

    let filter = InstanceFilter {
        workflow_id: query.workflow_id,
        state: state_filter,
        limit: query.limit,
        offset: query.offset,
    };

    let instances = state
        .index
        .list_instances(&filter)
        .await
        .map_err(index_error)?;

    let instances: Vec<InstanceDto> = instances.into_iter().map(InstanceDto::from).collect();

    Ok(Json(InstanceListResponse {
        count: instances.len(),
        instances,
    }))
}

async fn get_instance_handler(
    State(state): State<SharedApiState>,
    Path(instance_id): Path<String>,
) -> Result<Json<InstanceDto>, (StatusCode, Json<ErrorResponse>)> {
    let instance = state
        .index
        .get_instance(&instance_id)
        .await
        .map_err(index_error)?;

    match instance {
        Some(instance) => Ok(Json(instance.into())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Instance not found: {instance_id}"),
            }),
        )),
    }
}

/// `DELETE /v1/instances/:id` — look the instance up in the index, then tell
/// the engine that executes its workflow to abort it.
async fn abort_instance_handler(
    State(state): State<SharedApiState>,
    Path(instance_id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let instance = state
        .index
        .get_instance(&instance_id)
        .await
        .map_err(index_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Instance not found: {instance_id}"),
                }),
            )
        })?;

    let item = state
        .engine
        .workflow_item(&instance.workflow_id)
        .await
        .map_err(engine_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Workflow not found: {}", instance.workflow_id),
                }),
            )
        })?;

    let aborted = state
        .engine
        .abort_execution(&item, &instance_id)
        .await
        .map_err(engine_error)?;

    if !aborted {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Instance not found: {instance_id}"),
            }),
        ));
    }

    info!(
        instance_id = %instance_id,
        workflow_id = %instance.workflow_id,
        "Execution aborted"
    );

    Ok(StatusCode::NO_CONTENT)
}

fn parse_instance_state(s: &str) -> Result<InstanceState, (StatusCode, Json<ErrorResponse>)> {
    match s {
        "running" => Ok(InstanceState::Running),
        "completed" => Ok(InstanceState::Completed),
        "aborted" => Ok(InstanceState::Aborted),
        other => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!(
                    "Unknown instance state: '{other}'. Use 'running', 'completed', or 'aborted'."
                ),
            }),
        )),
    }
}

// ── Notification handlers ─────────────────────────────────────────────────

async fn list_notifications_handler(
    State(state): State<SharedApiState>,
    headers: HeaderMap,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<NotificationListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let scope = caller_scope(&state, &headers).await?;

    let filter = NotificationFilter {
        unread_only: query.unread_only,
        limit: query.limit,
        offset: query.offset,
    };

    let notifications = state
        .notifications
        .list(&scope, &filter)
        .await
        .map_err(store_error)?;

    let notifications: Vec<NotificationDto> =
        notifications.into_iter().map(NotificationDto::from).collect();

    Ok(Json(NotificationListResponse {
        count: notifications.len(),
        notifications,
    }))
}

async fn notification_count_handler(
    State(state): State<SharedApiState>,
    headers: HeaderMap,
) -> Result<Json<UnreadCountResponse>, (StatusCode, Json<ErrorResponse>)> {
    let scope = caller_scope(&state, &headers).await?;

    let unread = state
        .notifications
        .count_unread(&scope)
        .await
        .map_err(store_error)?;

    Ok(Json(UnreadCountResponse { unread }))
}

async fn create_notification_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<NotificationDto>), (StatusCode, Json<ErrorResponse>)> {
    let audience = match (payload.recipient, payload.group) {
        (Some(user_id), None) => {
            let principal = state
                .directory
                .principal(&user_id)
                .await
                .map_err(directory_error)?;

            if principal.is_none() {
                return Err((
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(ErrorResponse {
                        error: format!("Unknown user: {user_id}"),
                    }),
                ));
            }
            Audience::User(user_id)
        }
        (None, Some(group_id)) => {
            let exists = state
                .directory
                .group_exists(&group_id)
                .await
                .map_err(directory_error)?;

            if !exists {
                return Err((
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(ErrorResponse {
                        error: format!("Unknown group: {group_id}"),
                    }),
                ));
            }
            Audience::Group(group_id)
        }
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Provide exactly one of 'recipient' or 'group'".into(),
                }),
            ));
        }
    };

    let stored = state
        .notifications
        .create(NewNotification {
            audience,
            subject: payload.subject,
            body: payload.body,
        })
        .await
        .map_err(store_error)?;

    info!(id = %stored.id, "Notification created");

    Ok((StatusCode::CREATED, Json(stored.into())))
}

async fn mark_read_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<MarkReadResponse>, (StatusCode, Json<ErrorResponse>)> {
    let known = state
        .notifications
        .mark_read(&id)
        .await
        .map_err(store_error)?;

    if !known {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Notification not found: {id}"),
            }),
        ));
    }

    Ok(Json(MarkReadResponse { id, read: true }))
}

async fn mark_all_read_handler(
    State(state): State<SharedApiState>,
    headers: HeaderMap,
) -> Result<Json<MarkAllReadResponse>, (StatusCode, Json<ErrorResponse>)> {
    let scope = caller_scope(&state, &headers).await?;

    let updated = state
        .notifications
        .mark_all_read(&scope)
        .await
        .map_err(store_error)?;

    info!(user_id = %scope.user_id, updated, "Notifications marked read");

    Ok(Json(MarkAllReadResponse { updated }))
}

/// Resolve the calling user from the `X-User-Id` header into the scope of
/// audiences they can see.
async fn caller_scope(
    state: &ApiV1State,
    headers: &HeaderMap,
) -> Result<RecipientScope, (StatusCode, Json<ErrorResponse>)> {
    let user_id = headers
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Missing X-User-Id header".into(),
                }),
            )
        })?;

    let principal = state
        .directory
        .principal(user_id)
        .await
        .map_err(directory_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Unknown user: {user_id}"),
                }),
            )
        })?;

    Ok(principal.scope())
}

// ── Status ────────────────────────────────────────────────────────────────

async fn status_handler(State(state): State<SharedApiState>) -> Json<StatusResponse> {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.start_time)
        .num_seconds() as u64;

    Json(StatusResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: uptime,
        engine_url: state.config.engine.registry_url.clone(),
        index_url: state.config.index.base_url.clone(),
        directory_url: state.config.directory.base_url.clone(),
        notifications_backend: state.config.notifications.backend.clone(),
    })
}

// ── Error mapping ─────────────────────────────────────────────────────────

fn resolve_error(err: ResolveError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        ResolveError::WorkflowNotFound { .. } => StatusCode::NOT_FOUND,
        ResolveError::EngineUnavailable { .. } => StatusCode::BAD_GATEWAY,
        ResolveError::Schema(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        warn!(error = %err, "Input schema resolution failed");
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn engine_error(err: EngineError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        // The registry knows the workflow but it cannot be executed.
        EngineError::NoServiceUrl(_) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        ),
        other => {
            warn!(error = %other, "Engine request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: format!("Workflow engine unavailable: {other}"),
                }),
            )
        }
    }
}

fn index_error(err: IndexError) -> (StatusCode, Json<ErrorResponse>) {
    warn!(error = %err, "Index request failed");
    (
        StatusCode::BAD_GATEWAY,
        Json(ErrorResponse {
            error: format!("Instance index unavailable: {err}"),
        }),
    )
}

fn directory_error(err: DirectoryError) -> (StatusCode, Json<ErrorResponse>) {
    warn!(error = %err, "Directory request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: format!("Directory lookup failed: {err}"),
        }),
    )
}

fn store_error(err: NotifyError) -> (StatusCode, Json<ErrorResponse>) {
    warn!(error = %err, "Notification store failure");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: format!("Notification store failure: {err}"),
        }),
    )
}

// ── Test support ──────────────────────────────────────────────────────────


// ── Tests ─────────────────────────────────────────────────────────────────
