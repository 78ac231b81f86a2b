//! In-memory notification store — useful for testing and ephemeral runs.

use async_trait::async_trait;
use chrono::Utc;
use flowdesk_core::error::NotifyError;
use flowdesk_core::{
    NewNotification, Notification, NotificationFilter, NotificationStore, RecipientScope,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A notification store that keeps everything in a Vec.
pub struct InMemoryStore {
    entries: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn create(&self, new: NewNotification) -> Result<Notification, NotifyError> {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            audience: new.audience,
            subject: new.subject,
            body: new.body,
            read: false,
            created_at: Utc::now(),
            read_at: None,
        };
        self.entries.write().await.push(notification.clone());
        Ok(notification)
    }

    async fn list(
        &self,
        scope: &RecipientScope,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, NotifyError> {
        let entries = self.entries.read().await;

        // Reversed before the stable sort: created_at ties list newest
        // insertion first, same as the SQLite backend.
        let mut visible: Vec<Notification> = entries
            .iter()
            .rev()
            .filter(|n| scope.covers(&n.audience))
            .filter(|n| !filter.unread_only || !n.read)
            .cloned()
            .collect();

        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(visible
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn count_unread(&self, scope: &RecipientScope) -> Result<u64, NotifyError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|n| scope.covers(&n.audience) && !n.read)
            .count() as u64)
    }

    async fn mark_read(&self, id: &str) -> Result<bool, NotifyError> {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                if !n.read {
                    n.read = true;
                    n.read_at = Some(Utc::now());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, scope: &RecipientScope) -> Result<u64, NotifyError> {
        let mut entries = self.entries.write().await;
        let now = Utc::now();
        let mut changed = 0;
        for n in entries.iter_mut() {
            if scope.covers(&n.audience) && !n.read {
                n.read = true;
                n.read_at = Some(now);
                changed += 1;
            }
        }
        Ok(changed)
    }
}
