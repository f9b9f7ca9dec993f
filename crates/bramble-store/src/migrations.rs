//! Database migration management.
//!
//! SQL migrations are embedded at compile time from `migrations/` and
//! tracked by `SQLx` in its `_sqlx_migrations` table.

use crate::error::{Result, StoreError};
use sqlx::{Pool, Sqlite};

/// Run all pending database migrations.
///
/// # Errors
/// Returns `StoreError::Migration` if any migration fails to execute.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    tracing::info!("Running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Migration(format!("migration execution failed: {e}")))?;

    tracing::info!("Database migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;

    #[tokio::test]
    async fn test_run_migrations() {
        let db = Database::connect(":memory:").await.expect("connect");
        run_migrations(db.pool()).await.expect("run migrations");

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .expect("query tables");

        assert_eq!(
            tables,
            vec!["forum_topics", "members", "scraped_data", "thread_posts"]
        );
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let db = Database::connect(":memory:").await.expect("connect");

        run_migrations(db.pool()).await.expect("first run");
        run_migrations(db.pool())
            .await
            .expect("second run should be idempotent");
    }
}
