//! SQLite notification store.
//!
//! One `notifications` table; the audience is stored as a (kind, id) pair
//! so user and group notifications share the listing query. Visibility is
//! computed per request from the caller's scope, never materialized.

use async_trait::async_trait;
use chrono::Utc;
use flowdesk_core::error::NotifyError;
use flowdesk_core::{
    Audience, NewNotification, Notification, NotificationFilter, NotificationStore, RecipientScope,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// A SQLite-backed notification store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a store from a database path.
    ///
    /// The database and its schema are created automatically. Pass
    /// `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, NotifyError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| NotifyError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| NotifyError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite notification store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, NotifyError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), NotifyError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id            TEXT PRIMARY KEY,
                audience_kind TEXT NOT NULL,
                audience_id   TEXT NOT NULL,
                subject       TEXT NOT NULL,
                body          TEXT NOT NULL,
                read          INTEGER NOT NULL DEFAULT 0,
                created_at    TEXT NOT NULL,
                read_at       TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| NotifyError::MigrationFailed(format!("notifications table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_notifications_audience
             ON notifications(audience_kind, audience_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| NotifyError::MigrationFailed(format!("audience index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_notifications_created_at
             ON notifications(created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| NotifyError::MigrationFailed(format!("created_at index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Build the visibility clause for a scope.
    ///
    /// Returns the SQL fragment and the bind values, using positional
    /// parameters starting at `first_param`.
    fn scope_clause(scope: &RecipientScope, first_param: usize) -> (String, Vec<String>) {
        let mut clause = format!(
            "(audience_kind = 'user' AND audience_id = ?{first_param})"
        );
        let mut binds = vec![scope.user_id.clone()];

        if !scope.groups.is_empty() {
            let placeholders: Vec<String> = (0..scope.groups.len())
                .map(|i| format!("?{}", first_param + 1 + i))
                .collect();
            clause.push_str(&format!(
                " OR (audience_kind = 'group' AND audience_id IN ({}))",
                placeholders.join(", ")
            ));
            binds.extend(scope.groups.iter().cloned());
        }

        (format!("({clause})"), binds)
    }

    fn row_to_notification(row: &sqlx::sqlite::SqliteRow) -> Result<Notification, NotifyError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| NotifyError::Storage(format!("id column: {e}")))?;
        let audience_kind: String = row
            .try_get("audience_kind")
            .map_err(|e| NotifyError::Storage(format!("audience_kind column: {e}")))?;
        let audience_id: String = row
            .try_get("audience_id")
            .map_err(|e| NotifyError::Storage(format!("audience_id column: {e}")))?;
        let subject: String = row
            .try_get("subject")
            .map_err(|e| NotifyError::Storage(format!("subject column: {e}")))?;
        let body: String = row
            .try_get("body")
            .map_err(|e| NotifyError::Storage(format!("body column: {e}")))?;
        let read: i64 = row
            .try_get("read")
            .map_err(|e| NotifyError::Storage(format!("read column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| NotifyError::Storage(format!("created_at column: {e}")))?;
        let read_at_str: Option<String> = row
            .try_get("read_at")
            .map_err(|e| NotifyError::Storage(format!("read_at column: {e}")))?;

        let audience = match audience_kind.as_str() {
            "user" => Audience::User(audience_id),
            "group" => Audience::Group(audience_id),
            other => {
                return Err(NotifyError::Storage(format!(
                    "unknown audience kind in row: {other}"
                )));
            }
        };

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let read_at = read_at_str.and_then(|s| {
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        });

        Ok(Notification {
            id,
            audience,
            subject,
            body,
            read: read != 0,
            created_at,
            read_at,
        })
    }
}

#[async_trait]
impl NotificationStore for SqliteStore {
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

        let (kind, audience_id) = match &notification.audience {
            Audience::User(id) => ("user", id.as_str()),
            Audience::Group(id) => ("group", id.as_str()),
        };

        sqlx::query(
            r#"
            INSERT INTO notifications (id, audience_kind, audience_id, subject, body, read, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
            "#,
        )
        .bind(&notification.id)
        .bind(kind)
        .bind(audience_id)
        .bind(&notification.subject)
        .bind(&notification.body)
        .bind(notification.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| NotifyError::Storage(format!("INSERT failed: {e}")))?;

        debug!(id = %notification.id, kind, "Stored notification");
        Ok(notification)
    }

    async fn list(
        &self,
        scope: &RecipientScope,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, NotifyError> {
        let (clause, binds) = Self::scope_clause(scope, 1);
        let read_filter = if filter.unread_only { "AND read = 0" } else { "" };
        let limit_param = binds.len() + 1;
        let offset_param = binds.len() + 2;

        // rowid breaks created_at ties: rows stamped in the same instant
        // list newest insertion first.
        let sql = format!(
            "SELECT * FROM notifications
             WHERE {clause} {read_filter}
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?{limit_param} OFFSET ?{offset_param}"
        );

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }
        query = query.bind(filter.limit as i64).bind(filter.offset as i64);

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| NotifyError::Storage(format!("SELECT failed: {e}")))?;

        rows.iter().map(Self::row_to_notification).collect()
    }

    async fn count_unread(&self, scope: &RecipientScope) -> Result<u64, NotifyError> {
        let (clause, binds) = Self::scope_clause(scope, 1);
        let sql = format!(
            "SELECT COUNT(*) as cnt FROM notifications WHERE {clause} AND read = 0"
        );

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let row = query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| NotifyError::Storage(format!("COUNT failed: {e}")))?;

        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| NotifyError::Storage(format!("cnt column: {e}")))?;
        Ok(cnt as u64)
    }

    async fn mark_read(&self, id: &str) -> Result<bool, NotifyError> {
        // Idempotent: re-marking keeps the original read_at.
        let result = sqlx::query(
            "UPDATE notifications
             SET read = 1, read_at = COALESCE(read_at, ?1)
             WHERE id = ?2",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| NotifyError::Storage(format!("UPDATE failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, scope: &RecipientScope) -> Result<u64, NotifyError> {
        let (clause, binds) = Self::scope_clause(scope, 2);
        let sql = format!(
            "UPDATE notifications
             SET read = 1, read_at = ?1
             WHERE {clause} AND read = 0"
        );

        let mut query = sqlx::query(&sql).bind(Utc::now().to_rfc3339());
        for bind in &binds {
            query = query.bind(bind);
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| NotifyError::Storage(format!("UPDATE failed: {e}")))?;

        Ok(result.rows_affected())
    }
}
