//! # Flowdesk Core
//!
//! Domain types, traits, and error definitions for the flowdesk workflow
//! gateway. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (workflow engine, process-instance query
//! index, user directory, notification store) is defined as a trait here.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod directory;
pub mod error;
pub mod notification;
pub mod workflow;

// Re-export key types at crate root for ergonomics
pub use directory::{Directory, Principal};
pub use error::{
    DirectoryError, EngineError, Error, IndexError, NotifyError, ResolveError, Result, SchemaError,
};
pub use notification::{
    Audience, NewNotification, Notification, NotificationFilter, NotificationStore, RecipientScope,
};
pub use workflow::{
    ExecutionRef, InstanceFilter, InstanceIndex, InstanceState, InstanceVariables, ProcessEngine,
    ProcessInstance, RuntimeInfo, WorkflowItem,
};
