//! Database client for the Helios scheduling core.
//!
//! Thin pool wrapper over SQLx's SQLite driver. The concrete driver keeps
//! 64-bit integer columns (token expiries in unix millis) intact; the
//! generic `Any` driver narrows them on decode.

use crate::error::DbError;
use helios_config::{AppConfig, DatabaseConfig};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::time::Duration;
use tracing::{debug, info};

/// Database client holding the shared connection pool.
#[derive(Debug, Clone)]
pub struct DbClient {
    pool: Pool<Sqlite>,
}

impl DbClient {
    /// Create a client from the application configuration.
    pub async fn new(config: &AppConfig) -> Result<Self, DbError> {
        Self::from_config(&config.database).await
    }

    /// Create a client from an explicit database configuration.
    pub async fn from_config(db_config: &DatabaseConfig) -> Result<Self, DbError> {
        debug!("Connecting to database");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&db_config.url)
            .await
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        info!("Database connection established");
        Ok(Self { pool })
    }

    /// In-memory SQLite client for tests. A single connection keeps every
    /// query on the same in-memory database.
    pub async fn in_memory() -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self { pool })
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Execute a statement that returns no rows.
    pub async fn execute(&self, query: &str) -> Result<(), DbError> {
        sqlx::query(query)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(())
    }
}
