//! Database connection management.
//!
//! Wraps a `SQLx` SQLite pool behind a small `Database` handle that the
//! router and the handler modules share.

use crate::error::{Result, StoreError};
use crate::migrations;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

/// SQLite database handle with pooling and embedded migrations.
#[derive(Debug)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open (or create) the database at the given connection string.
    ///
    /// Accepts `sqlite://path.db`-style URLs or plain paths, and
    /// `:memory:` for tests.
    ///
    /// # Errors
    /// Returns `StoreError::Open` if the database cannot be opened.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Open(format!("invalid connection string: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Open(format!("failed to connect: {e}")))?;

        tracing::info!("Database pool created for {}", url);
        Ok(Self { pool })
    }

    /// Run all pending database migrations.
    ///
    /// # Errors
    /// Returns `StoreError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get a reference to the underlying `SQLx` pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the connection pool gracefully.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_in_memory() {
        let db = Database::connect(":memory:").await.expect("connect");
        sqlx::query("SELECT 1")
            .execute(db.pool())
            .await
            .expect("ping database");
    }

    #[tokio::test]
    async fn test_close() {
        let db = Database::connect(":memory:").await.expect("connect");
        db.close().await; // Should not panic
    }
}
