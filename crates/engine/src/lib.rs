//! HTTP clients for flowdesk's external collaborators.
//!
//! All clients implement the corresponding `flowdesk_core` trait:
//! - [`EngineClient`] — workflow registry + per-workflow execution endpoints
//! - [`IndexClient`] — the secondary process-instance query index
//! - [`DirectoryClient`] — user and group resolution

pub mod directory_client;
pub mod engine_client;
pub mod index_client;

pub use directory_client::DirectoryClient;
pub use engine_client::EngineClient;
pub use index_client::IndexClient;
