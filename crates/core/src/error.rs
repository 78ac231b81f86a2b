//! Error types for the flowdesk domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all flowdesk operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Input-schema resolution errors ---
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    // --- Workflow engine errors ---
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    // --- Query index errors ---
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    // --- Directory errors ---
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    // --- Notification errors ---
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the input-schema resolution pipeline.
///
/// `WorkflowNotFound` is client-visible; the other variants surface as
/// server errors. Absent instance data is NOT an error — the resolver
/// absorbs it and continues with an empty state for that role.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Workflow not found: {workflow_id}")]
    WorkflowNotFound { workflow_id: String },

    #[error("Workflow engine unavailable: {reason}")]
    EngineUnavailable { reason: String },

    #[error("Input schema error: {0}")]
    Schema(#[from] SchemaError),
}

/// Structural problems in a declared input schema.
///
/// Always names the offending composition member so the caller can tell
/// which form step is broken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Input schema is not a JSON object")]
    NotAnObject,

    #[error("Composition member '{member}' declares no field definitions")]
    MissingProperties { member: String },

    #[error("Unresolvable reference '{reference}' in composition member '{member}'")]
    UnresolvedRef { member: String, reference: String },
}

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Engine API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Unexpected engine response: {0}")]
    InvalidResponse(String),

    #[error("Workflow has no execution endpoint: {0}")]
    NoServiceUrl(String),
}

#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("Index API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected index response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    #[error("Directory API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Unknown audience: {0}")]
    UnknownAudience(String),
}
