//! Notification store trait and entry types.
//!
//! Notifications are addressed to either a single user or a directory
//! group. A caller's visible set is everything addressed to their user id
//! or to any group they belong to. Read state is a per-row flag; marking a
//! group notification read marks it for everyone (delivery semantics beyond
//! this flag are out of scope).

use crate::error::NotifyError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who a notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Audience {
    User(String),
    Group(String),
}

impl Audience {
    pub fn id(&self) -> &str {
        match self {
            Audience::User(id) | Audience::Group(id) => id,
        }
    }
}

/// A stored notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Unique id (UUID v4)
    pub id: String,

    /// Addressee
    pub audience: Audience,

    /// Short subject line
    pub subject: String,

    /// Message body
    pub body: String,

    /// Whether the notification has been read
    pub read: bool,

    /// When the notification was created
    pub created_at: DateTime<Utc>,

    /// When it was first marked read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
}

/// Input for creating a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub audience: Audience,
    pub subject: String,
    pub body: String,
}

/// The set of audiences one caller can see: their own user id plus every
/// group the directory places them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientScope {
    pub user_id: String,
    pub groups: Vec<String>,
}

impl RecipientScope {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            groups: Vec::new(),
        }
    }

    /// Whether a notification with this audience is visible in the scope.
    pub fn covers(&self, audience: &Audience) -> bool {
        match audience {
            Audience::User(id) => *id == self.user_id,
            Audience::Group(id) => self.groups.iter().any(|g| g == id),
        }
    }
}

/// Listing options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationFilter {
    /// Only return unread notifications
    #[serde(default)]
    pub unread_only: bool,

    /// Page size
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Page offset
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

impl Default for NotificationFilter {
    fn default() -> Self {
        Self {
            unread_only: false,
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// The notification store trait.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a new notification and return the stored row.
    async fn create(&self, new: NewNotification) -> Result<Notification, NotifyError>;

    /// List notifications visible in the scope, newest first.
    async fn list(
        &self,
        scope: &RecipientScope,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, NotifyError>;

    /// Count unread notifications visible in the scope.
    async fn count_unread(&self, scope: &RecipientScope) -> Result<u64, NotifyError>;

    /// Mark one notification read. Idempotent; returns `false` when the id
    /// is unknown.
    async fn mark_read(&self, id: &str) -> Result<bool, NotifyError>;

    /// Mark every notification in the scope read; returns how many changed.
    async fn mark_all_read(&self, scope: &RecipientScope) -> Result<u64, NotifyError>;
}
