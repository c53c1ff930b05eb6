//! Scheduled interview storage.
//!
//! Rows are created by the booking orchestrator and deleted by the same
//! orchestrator as a compensating action when calendar event creation fails.
//! Outside of that, a row is immutable except for meeting-link backfill and
//! status transitions.

use crate::error::DbError;
use crate::DbClient;
use helios_common::services::BoxFuture;
use sqlx::Row;
use tracing::{debug, error};

pub const STATUS_SCHEDULED: &str = "scheduled";

/// A booked interview between a recruiter and a sales rep for a job.
#[derive(Debug, Clone)]
pub struct ScheduledInterview {
    pub id: Option<i64>,
    pub job_id: String,
    pub applicant_id: String,
    pub recruiter_id: String,
    pub sales_rep_id: String,
    /// YYYY-MM-DD in the recruiter's timezone.
    pub scheduled_date: String,
    /// HH:MM, 24h, in the recruiter's timezone.
    pub scheduled_time: String,
    pub duration_minutes: i64,
    pub status: String,
    pub meeting_link: Option<String>,
}

pub trait ScheduledInterviewRepository: Send + Sync {
    fn init_schema(&self) -> BoxFuture<'_, (), DbError>;

    /// Insert a new interview row and return its id.
    fn create(&self, interview: ScheduledInterview) -> BoxFuture<'_, i64, DbError>;

    fn find_by_id(&self, id: i64) -> BoxFuture<'_, Option<ScheduledInterview>, DbError>;

    /// Compensating delete. Returns whether a row was removed.
    fn delete(&self, id: i64) -> BoxFuture<'_, bool, DbError>;

    /// Backfill the conference link after the calendar event exists.
    fn set_meeting_link(&self, id: i64, meeting_link: &str) -> BoxFuture<'_, (), DbError>;
}

/// SQL implementation of the scheduled interview repository.
#[derive(Debug, Clone)]
pub struct SqlScheduledInterviewRepository {
    db_client: DbClient,
}

impl SqlScheduledInterviewRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }
}

fn row_to_interview(row: &sqlx::sqlite::SqliteRow) -> ScheduledInterview {
    ScheduledInterview {
        id: row.try_get("id").ok(),
        job_id: row.try_get("job_id").unwrap_or_default(),
        applicant_id: row.try_get("applicant_id").unwrap_or_default(),
        recruiter_id: row.try_get("recruiter_id").unwrap_or_default(),
        sales_rep_id: row.try_get("sales_rep_id").unwrap_or_default(),
        scheduled_date: row.try_get("scheduled_date").unwrap_or_default(),
        scheduled_time: row.try_get("scheduled_time").unwrap_or_default(),
        duration_minutes: row.try_get("duration_minutes").unwrap_or_default(),
        status: row.try_get("status").unwrap_or_default(),
        meeting_link: row
            .try_get::<Option<String>, _>("meeting_link")
            .unwrap_or(None),
    }
}

impl ScheduledInterviewRepository for SqlScheduledInterviewRepository {
    fn init_schema(&self) -> BoxFuture<'_, (), DbError> {
        Box::pin(async move {
            let query = r#"
                CREATE TABLE IF NOT EXISTS scheduled_interviews (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    job_id TEXT NOT NULL,
                    applicant_id TEXT NOT NULL,
                    recruiter_id TEXT NOT NULL,
                    sales_rep_id TEXT NOT NULL,
                    scheduled_date TEXT NOT NULL,
                    scheduled_time TEXT NOT NULL,
                    duration_minutes BIGINT NOT NULL,
                    status TEXT NOT NULL,
                    meeting_link TEXT,
                    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
                )
            "#;
            self.db_client.execute(query).await
        })
    }

    fn create(&self, interview: ScheduledInterview) -> BoxFuture<'_, i64, DbError> {
        Box::pin(async move {
            debug!(
                "Creating interview row for job {} ({} / {})",
                interview.job_id, interview.recruiter_id, interview.sales_rep_id
            );

            let query = r#"
                INSERT INTO scheduled_interviews
                    (job_id, applicant_id, recruiter_id, sales_rep_id,
                     scheduled_date, scheduled_time, duration_minutes, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id
            "#;

            let row = sqlx::query(query)
                .bind(&interview.job_id)
                .bind(&interview.applicant_id)
                .bind(&interview.recruiter_id)
                .bind(&interview.sales_rep_id)
                .bind(&interview.scheduled_date)
                .bind(&interview.scheduled_time)
                .bind(interview.duration_minutes)
                .bind(&interview.status)
                .fetch_one(self.db_client.pool())
                .await
                .map_err(|e| {
                    error!("Failed to create interview row: {}", e);
                    DbError::QueryError(e.to_string())
                })?;

            row.try_get("id").map_err(|e| DbError::QueryError(e.to_string()))
        })
    }

    fn find_by_id(&self, id: i64) -> BoxFuture<'_, Option<ScheduledInterview>, DbError> {
        Box::pin(async move {
            let query = r#"
                SELECT id, job_id, applicant_id, recruiter_id, sales_rep_id,
                       scheduled_date, scheduled_time, duration_minutes, status, meeting_link
                FROM scheduled_interviews
                WHERE id = $1
            "#;

            let row = sqlx::query(query)
                .bind(id)
                .fetch_optional(self.db_client.pool())
                .await
                .map_err(|e| DbError::QueryError(e.to_string()))?;

            Ok(row.as_ref().map(row_to_interview))
        })
    }

    fn delete(&self, id: i64) -> BoxFuture<'_, bool, DbError> {
        Box::pin(async move {
            debug!("Deleting interview row {}", id);
            let result = sqlx::query("DELETE FROM scheduled_interviews WHERE id = $1")
                .bind(id)
                .execute(self.db_client.pool())
                .await
                .map_err(|e| DbError::QueryError(e.to_string()))?;

            Ok(result.rows_affected() > 0)
        })
    }

    fn set_meeting_link(&self, id: i64, meeting_link: &str) -> BoxFuture<'_, (), DbError> {
        let meeting_link = meeting_link.to_string();
        Box::pin(async move {
            sqlx::query(
                r#"
                    UPDATE scheduled_interviews
                    SET meeting_link = $1, updated_at = CURRENT_TIMESTAMP
                    WHERE id = $2
                "#,
            )
            .bind(&meeting_link)
            .bind(id)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;

            Ok(())
        })
    }
}
