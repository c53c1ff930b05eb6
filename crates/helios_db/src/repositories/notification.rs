//! In-app notification rows.
//!
//! The booking orchestrator marks the originating interview invitation as
//! read and inserts a confirmation notification for the recruiter. The rest
//! of the notification feature lives outside the scheduling core.

use crate::error::DbError;
use crate::DbClient;
use helios_common::services::BoxFuture;
use sqlx::Row;
use tracing::error;

#[derive(Debug, Clone)]
pub struct NotificationRecord {
    pub id: Option<i64>,
    pub user_id: String,
    pub kind: String,
    pub body: String,
    pub read: bool,
}

pub trait NotificationRepository: Send + Sync {
    fn init_schema(&self) -> BoxFuture<'_, (), DbError>;

    fn insert(&self, notification: NotificationRecord) -> BoxFuture<'_, i64, DbError>;

    /// Returns whether a row was updated.
    fn mark_read(&self, id: i64) -> BoxFuture<'_, bool, DbError>;
}

/// SQL implementation of the notification repository.
#[derive(Debug, Clone)]
pub struct SqlNotificationRepository {
    db_client: DbClient,
}

impl SqlNotificationRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }
}

impl NotificationRepository for SqlNotificationRepository {
    fn init_schema(&self) -> BoxFuture<'_, (), DbError> {
        Box::pin(async move {
            let query = r#"
                CREATE TABLE IF NOT EXISTS notifications (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    body TEXT NOT NULL,
                    read INTEGER NOT NULL DEFAULT 0,
                    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
                )
            "#;
            self.db_client.execute(query).await
        })
    }

    fn insert(&self, notification: NotificationRecord) -> BoxFuture<'_, i64, DbError> {
        Box::pin(async move {
            let row = sqlx::query(
                r#"
                    INSERT INTO notifications (user_id, kind, body, read)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id
                "#,
            )
            .bind(&notification.user_id)
            .bind(&notification.kind)
            .bind(&notification.body)
            .bind(if notification.read { 1_i64 } else { 0_i64 })
            .fetch_one(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to insert notification: {}", e);
                DbError::QueryError(e.to_string())
            })?;

            row.try_get("id").map_err(|e| DbError::QueryError(e.to_string()))
        })
    }

    fn mark_read(&self, id: i64) -> BoxFuture<'_, bool, DbError> {
        Box::pin(async move {
            let result = sqlx::query("UPDATE notifications SET read = 1 WHERE id = $1")
                .bind(id)
                .execute(self.db_client.pool())
                .await
                .map_err(|e| DbError::QueryError(e.to_string()))?;

            Ok(result.rows_affected() > 0)
        })
    }
}
