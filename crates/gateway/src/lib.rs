//! HTTP API gateway for Flowdesk.
//!
//! Exposes REST endpoints for health checks and the full v1 API with
//! workflows, input-schema resolution, process instances, and
//! notifications.
//!
//! Built on Axum for high performance async HTTP.

pub mod api_v1;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::info;

use flowdesk_core::directory::Directory;
use flowdesk_core::notification::NotificationStore;
use flowdesk_core::workflow::{InstanceIndex, ProcessEngine};
use flowdesk_engine::{DirectoryClient, EngineClient, IndexClient};
use flowdesk_notify::{InMemoryStore, SqliteStore};
use flowdesk_schema::InputSchemaResolver;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - CORS with restrictive origin policy
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: api_v1::SharedApiState) -> Router {
    // CORS: only allow same-origin by default; explicit origins can be configured.
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::exact(
            "http://localhost:8460".parse().unwrap(),
        ))
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderName::from_static("x-user-id"),
        ])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// Builds the collaborator clients and the notification store ONCE and
/// shares them via Arc between the resolver and the route handlers.
pub async fn start(config: flowdesk_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let host = config.gateway.host.clone();
    let port = config.gateway.port;
    let addr = format!("{host}:{port}");

    // === Build shared collaborators ONCE (no duplication) ===
    let engine: Arc<dyn ProcessEngine> = Arc::new(EngineClient::with_timeout(
        config.engine.registry_url.clone(),
        std::time::Duration::from_secs(config.engine.request_timeout_secs),
    ));
    let index: Arc<dyn InstanceIndex> = Arc::new(IndexClient::with_timeout(
        config.index.base_url.clone(),
        std::time::Duration::from_secs(config.index.request_timeout_secs),
    ));
    let directory: Arc<dyn Directory> =
        Arc::new(DirectoryClient::new(config.directory.base_url.clone()));

    let notifications: Arc<dyn NotificationStore> = match config.notifications.backend.as_str() {
        "memory" => Arc::new(InMemoryStore::new()),
        _ => {
            let db_path = config.notification_db_path();
            if let Some(parent) = db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            info!(path = %db_path.display(), "Opening notification store");
            Arc::new(SqliteStore::new(&db_path.to_string_lossy()).await?)
        }
    };

    let resolver = InputSchemaResolver::new(engine.clone(), index.clone());

    let state = Arc::new(api_v1::ApiV1State {
        engine,
        index,
        directory,
        notifications,
        resolver,
        config: config.clone(),
        start_time: chrono::Utc::now(),
    });

    let app = build_router(state);

    info!(addr = %addr, "Gateway starting with v1 API");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
