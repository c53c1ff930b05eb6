//! Read-only view of job postings.
//!
//! Jobs are owned by the wider application; the scheduling core only needs
//! the title for event summaries and booking mails.

use crate::error::DbError;
use crate::DbClient;
use helios_common::services::BoxFuture;
use sqlx::Row;

#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: String,
    pub title: String,
}

pub trait JobRepository: Send + Sync {
    fn init_schema(&self) -> BoxFuture<'_, (), DbError>;

    fn find_job(&self, job_id: &str) -> BoxFuture<'_, Option<JobRecord>, DbError>;
}

/// SQL implementation of the job repository.
#[derive(Debug, Clone)]
pub struct SqlJobRepository {
    db_client: DbClient,
}

impl SqlJobRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }
}

impl JobRepository for SqlJobRepository {
    fn init_schema(&self) -> BoxFuture<'_, (), DbError> {
        Box::pin(async move {
            self.db_client
                .execute(
                    r#"
                        CREATE TABLE IF NOT EXISTS jobs (
                            job_id TEXT PRIMARY KEY,
                            title TEXT NOT NULL
                        )
                    "#,
                )
                .await
        })
    }

    fn find_job(&self, job_id: &str) -> BoxFuture<'_, Option<JobRecord>, DbError> {
        let job_id = job_id.to_string();
        Box::pin(async move {
            let row = sqlx::query("SELECT job_id, title FROM jobs WHERE job_id = $1")
                .bind(&job_id)
                .fetch_optional(self.db_client.pool())
                .await
                .map_err(|e| DbError::QueryError(e.to_string()))?;

            Ok(row.map(|row| JobRecord {
                job_id: row.try_get("job_id").unwrap_or_default(),
                title: row.try_get("title").unwrap_or_default(),
            }))
        })
    }
}
