//! Read-only view of user profiles and weekly availability windows.
//!
//! Profile data is owned by the wider application; the scheduling core only
//! consumes it. Weekday numbering follows `chrono::Weekday::num_days_from_monday`
//! (0 = Monday).

use crate::error::DbError;
use crate::DbClient;
use helios_common::services::BoxFuture;
use sqlx::Row;

#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    /// IANA timezone name, e.g. "America/New_York".
    pub timezone: String,
}

/// One weekday's working hours in the user's stored timezone.
#[derive(Debug, Clone)]
pub struct AvailabilityWindow {
    pub user_id: String,
    /// 0 = Monday .. 6 = Sunday.
    pub weekday: i64,
    pub enabled: bool,
    /// HH:MM, 24h.
    pub start_time: String,
    /// HH:MM, 24h.
    pub end_time: String,
}

pub trait ProfileRepository: Send + Sync {
    fn init_schema(&self) -> BoxFuture<'_, (), DbError>;

    fn find_profile(&self, user_id: &str) -> BoxFuture<'_, Option<UserProfile>, DbError>;

    /// The user's window for one weekday, if any is configured.
    fn window_for(
        &self,
        user_id: &str,
        weekday: i64,
    ) -> BoxFuture<'_, Option<AvailabilityWindow>, DbError>;
}

/// SQL implementation of the profile repository.
#[derive(Debug, Clone)]
pub struct SqlProfileRepository {
    db_client: DbClient,
}

impl SqlProfileRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }
}

impl ProfileRepository for SqlProfileRepository {
    fn init_schema(&self) -> BoxFuture<'_, (), DbError> {
        Box::pin(async move {
            self.db_client
                .execute(
                    r#"
                        CREATE TABLE IF NOT EXISTS user_profiles (
                            user_id TEXT PRIMARY KEY,
                            full_name TEXT NOT NULL,
                            email TEXT NOT NULL,
                            timezone TEXT NOT NULL
                        )
                    "#,
                )
                .await?;
            self.db_client
                .execute(
                    r#"
                        CREATE TABLE IF NOT EXISTS availability_windows (
                            id INTEGER PRIMARY KEY AUTOINCREMENT,
                            user_id TEXT NOT NULL,
                            weekday BIGINT NOT NULL,
                            enabled INTEGER NOT NULL DEFAULT 1,
                            start_time TEXT NOT NULL,
                            end_time TEXT NOT NULL,
                            UNIQUE(user_id, weekday)
                        )
                    "#,
                )
                .await
        })
    }

    fn find_profile(&self, user_id: &str) -> BoxFuture<'_, Option<UserProfile>, DbError> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT user_id, full_name, email, timezone FROM user_profiles WHERE user_id = $1",
            )
            .bind(&user_id)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;

            Ok(row.map(|row| UserProfile {
                user_id: row.try_get("user_id").unwrap_or_default(),
                full_name: row.try_get("full_name").unwrap_or_default(),
                email: row.try_get("email").unwrap_or_default(),
                timezone: row.try_get("timezone").unwrap_or_default(),
            }))
        })
    }

    fn window_for(
        &self,
        user_id: &str,
        weekday: i64,
    ) -> BoxFuture<'_, Option<AvailabilityWindow>, DbError> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            let row = sqlx::query(
                r#"
                    SELECT user_id, weekday, enabled, start_time, end_time
                    FROM availability_windows
                    WHERE user_id = $1 AND weekday = $2
                "#,
            )
            .bind(&user_id)
            .bind(weekday)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;

            Ok(row.map(|row| AvailabilityWindow {
                user_id: row.try_get("user_id").unwrap_or_default(),
                weekday: row.try_get("weekday").unwrap_or_default(),
                enabled: row.try_get::<i64, _>("enabled").unwrap_or(0) != 0,
                start_time: row.try_get("start_time").unwrap_or_default(),
                end_time: row.try_get("end_time").unwrap_or_default(),
            }))
        })
    }
}
