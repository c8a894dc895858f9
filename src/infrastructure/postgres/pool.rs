//! PostgreSQL connection pool.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;

use crate::config::DatabaseConfig;

/// Errors that can occur with the PostgreSQL pool.
#[derive(Debug, Error)]
pub enum PostgresPoolError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Database URL is not configured")]
    NotConfigured,
}

/// PostgreSQL connection pool shared by the store implementations.
#[derive(Clone)]
pub struct PostgresPool {
    /// The underlying connection pool
    pool: PgPool,

    /// Database URL (for logging purposes)
    database_url: String,
}

impl PostgresPool {
    /// Create a new PostgreSQL pool from configuration.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, PostgresPoolError> {
        let url = config.url.as_deref().ok_or(PostgresPoolError::NotConfigured)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds as u64))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds as u64))
            .connect(url)
            .await?;

        let created = Self {
            pool,
            database_url: url.to_string(),
        };

        tracing::info!(
            pool_size = config.pool_size,
            url = %created.database_url_masked(),
            "PostgreSQL connection pool created"
        );

        Ok(created)
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run a trivial query to confirm the database is reachable.
    pub async fn ping(&self) -> Result<(), PostgresPoolError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Current pool size and idle connection count.
    pub fn stats(&self) -> (u32, u32) {
        (self.pool.size(), self.pool.num_idle() as u32)
    }

    /// Get the database URL (masked for logging).
    pub fn database_url_masked(&self) -> String {
        mask_url(&self.database_url)
    }

    /// Close the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL connection pool closed");
    }
}

/// Replace the password portion of a connection URL with `***`
fn mask_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let prefix = &url[..colon_pos + 1];
            let suffix = &url[at_pos..];
            return format!("{}***{}", prefix, suffix);
        }
    }
    url.to_string()
}
