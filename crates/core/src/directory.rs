//! Directory trait — the abstraction over the external user/group service.
//!
//! Notification scoping resolves the calling user against this directory to
//! learn which groups they belong to. Identity itself (who the caller is)
//! arrives from outside; this trait only answers "does this principal
//! exist, and what groups is it in".

use crate::error::DirectoryError;
use crate::notification::RecipientScope;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A user as the directory knows it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Directory identifier of the user
    pub id: String,

    /// Human-readable name, if the directory records one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Groups the user belongs to
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Principal {
    /// The notification scope this principal can see.
    pub fn scope(&self) -> RecipientScope {
        RecipientScope {
            user_id: self.id.clone(),
            groups: self.groups.clone(),
        }
    }
}

/// The directory trait.
///
/// Lookups return `Ok(None)` / `Ok(false)` for unknown principals and
/// groups; errors are reserved for transport failures.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Resolve a user id to a principal with its group memberships.
    async fn principal(&self, user_id: &str) -> Result<Option<Principal>, DirectoryError>;

    /// Check whether a group exists.
    async fn group_exists(&self, group_id: &str) -> Result<bool, DirectoryError>;

    /// Health check — can we reach the directory?
    async fn health_check(&self) -> Result<bool, DirectoryError> {
        Ok(true)
    }
}
