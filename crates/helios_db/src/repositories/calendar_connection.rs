//! Per-user calendar connection storage.
//!
//! At most one row exists per (user, provider); writes are upserts. Token
//! columns hold ciphertext; the `encrypted` flag distinguishes legacy
//! plaintext rows from sealed ones so a migration can proceed lazily. Only
//! the token store reads these rows.

use crate::error::DbError;
use crate::DbClient;
use helios_common::services::BoxFuture;
use sqlx::Row;
use std::collections::HashMap;
use tracing::{debug, error};

/// Persisted credential record for one (user, provider) pair.
#[derive(Debug, Clone)]
pub struct CalendarConnection {
    pub id: Option<i64>,
    pub user_id: String,
    pub provider: String,
    /// Ciphertext (base64) unless `encrypted` is false.
    pub access_token: String,
    pub refresh_token: String,
    /// Unix millis at which the access token expires.
    pub token_expiry_ms: i64,
    pub encrypted: bool,
    /// Name of the OAuth client config the tokens were issued under.
    pub oauth_config_name: String,
}

/// Repository for calendar connection rows.
pub trait CalendarConnectionRepository: Send + Sync {
    /// Create the backing table if it does not exist.
    fn init_schema(&self) -> BoxFuture<'_, (), DbError>;

    /// Insert or replace the row for (user, provider). Stamps `updated_at`.
    fn upsert(&self, connection: CalendarConnection) -> BoxFuture<'_, (), DbError>;

    fn find_by_user(
        &self,
        user_id: &str,
        provider: &str,
    ) -> BoxFuture<'_, Option<CalendarConnection>, DbError>;

    fn delete_by_user(&self, user_id: &str, provider: &str) -> BoxFuture<'_, bool, DbError>;

    /// Connected-user count per OAuth client config, for capacity selection.
    fn count_by_config(&self) -> BoxFuture<'_, HashMap<String, i64>, DbError>;

    /// Connections whose access token expires before `expiry_before_ms`.
    fn list_expiring(
        &self,
        expiry_before_ms: i64,
    ) -> BoxFuture<'_, Vec<CalendarConnection>, DbError>;
}

/// SQL implementation of the calendar connection repository.
#[derive(Debug, Clone)]
pub struct SqlCalendarConnectionRepository {
    db_client: DbClient,
}

impl SqlCalendarConnectionRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }
}

fn row_to_connection(row: &sqlx::sqlite::SqliteRow) -> CalendarConnection {
    CalendarConnection {
        id: row.try_get("id").ok(),
        user_id: row.try_get("user_id").unwrap_or_default(),
        provider: row.try_get("provider").unwrap_or_default(),
        access_token: row.try_get("access_token").unwrap_or_default(),
        refresh_token: row.try_get("refresh_token").unwrap_or_default(),
        token_expiry_ms: row.try_get("token_expiry_ms").unwrap_or_default(),
        encrypted: row.try_get::<i64, _>("encrypted").unwrap_or(0) != 0,
        oauth_config_name: row.try_get("oauth_config_name").unwrap_or_default(),
    }
}

impl CalendarConnectionRepository for SqlCalendarConnectionRepository {
    fn init_schema(&self) -> BoxFuture<'_, (), DbError> {
        Box::pin(async move {
            let query = r#"
                CREATE TABLE IF NOT EXISTS calendar_connections (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    provider TEXT NOT NULL,
                    access_token TEXT NOT NULL,
                    refresh_token TEXT NOT NULL,
                    token_expiry_ms BIGINT NOT NULL,
                    encrypted INTEGER NOT NULL DEFAULT 1,
                    oauth_config_name TEXT NOT NULL,
                    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                    UNIQUE(user_id, provider)
                )
            "#;
            self.db_client.execute(query).await
        })
    }

    fn upsert(&self, connection: CalendarConnection) -> BoxFuture<'_, (), DbError> {
        Box::pin(async move {
            debug!("Upserting calendar connection for user: {}", connection.user_id);

            let existing = self
                .find_by_user(&connection.user_id, &connection.provider)
                .await?;

            let query = if existing.is_some() {
                r#"
                    UPDATE calendar_connections
                    SET access_token = $1, refresh_token = $2, token_expiry_ms = $3,
                        encrypted = $4, oauth_config_name = $5,
                        updated_at = CURRENT_TIMESTAMP
                    WHERE user_id = $6 AND provider = $7
                "#
            } else {
                r#"
                    INSERT INTO calendar_connections
                        (access_token, refresh_token, token_expiry_ms, encrypted,
                         oauth_config_name, user_id, provider)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#
            };

            sqlx::query(query)
                .bind(&connection.access_token)
                .bind(&connection.refresh_token)
                .bind(connection.token_expiry_ms)
                .bind(if connection.encrypted { 1_i64 } else { 0_i64 })
                .bind(&connection.oauth_config_name)
                .bind(&connection.user_id)
                .bind(&connection.provider)
                .execute(self.db_client.pool())
                .await
                .map_err(|e| {
                    error!("Failed to upsert calendar connection: {}", e);
                    DbError::QueryError(e.to_string())
                })?;

            Ok(())
        })
    }

    fn find_by_user(
        &self,
        user_id: &str,
        provider: &str,
    ) -> BoxFuture<'_, Option<CalendarConnection>, DbError> {
        let user_id = user_id.to_string();
        let provider = provider.to_string();
        Box::pin(async move {
            let query = r#"
                SELECT id, user_id, provider, access_token, refresh_token,
                       token_expiry_ms, encrypted, oauth_config_name
                FROM calendar_connections
                WHERE user_id = $1 AND provider = $2
            "#;

            let row = sqlx::query(query)
                .bind(&user_id)
                .bind(&provider)
                .fetch_optional(self.db_client.pool())
                .await
                .map_err(|e| DbError::QueryError(e.to_string()))?;

            Ok(row.as_ref().map(row_to_connection))
        })
    }

    fn delete_by_user(&self, user_id: &str, provider: &str) -> BoxFuture<'_, bool, DbError> {
        let user_id = user_id.to_string();
        let provider = provider.to_string();
        Box::pin(async move {
            let result = sqlx::query(
                "DELETE FROM calendar_connections WHERE user_id = $1 AND provider = $2",
            )
            .bind(&user_id)
            .bind(&provider)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;

            Ok(result.rows_affected() > 0)
        })
    }

    fn count_by_config(&self) -> BoxFuture<'_, HashMap<String, i64>, DbError> {
        Box::pin(async move {
            let rows = sqlx::query(
                r#"
                    SELECT oauth_config_name, COUNT(*) AS user_count
                    FROM calendar_connections
                    GROUP BY oauth_config_name
                "#,
            )
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;

            let mut counts = HashMap::new();
            for row in rows {
                let name: String = row.try_get("oauth_config_name").unwrap_or_default();
                let count: i64 = row.try_get("user_count").unwrap_or_default();
                counts.insert(name, count);
            }
            Ok(counts)
        })
    }

    fn list_expiring(
        &self,
        expiry_before_ms: i64,
    ) -> BoxFuture<'_, Vec<CalendarConnection>, DbError> {
        Box::pin(async move {
            let rows = sqlx::query(
                r#"
                    SELECT id, user_id, provider, access_token, refresh_token,
                           token_expiry_ms, encrypted, oauth_config_name
                    FROM calendar_connections
                    WHERE token_expiry_ms < $1
                "#,
            )
            .bind(expiry_before_ms)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;

            Ok(rows.iter().map(row_to_connection).collect())
        })
    }
}
