//! Error types for the database client.

use helios_common::SchedulingError;
use thiserror::Error;

/// Errors that can occur when working with the database client.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Database configuration error: {0}")]
    ConfigError(String),

    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Database query error: {0}")]
    QueryError(String),
}

impl From<DbError> for SchedulingError {
    fn from(err: DbError) -> Self {
        SchedulingError::Database(err.to_string())
    }
}
