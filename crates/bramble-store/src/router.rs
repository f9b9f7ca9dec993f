//! The storage router.
//!
//! One entry point — `store(collection, records)` — that dispatches to the
//! registered database handler for the collection (or the generic payload
//! table) and falls back to the JSONL file backend when the database
//! fails, so a batch is never silently dropped. Nothing raises past this
//! boundary.

use crate::connection::Database;
use crate::error::Result;
use crate::file::FileStore;
use crate::{generic, members, posts, topics};
use bramble_core::{collections, Record};
use std::path::PathBuf;

/// Routes record batches to the configured backend.
pub struct StorageRouter {
    database: Option<Database>,
    files: FileStore,
}

impl StorageRouter {
    /// File-only router (also the shape the database router degrades to).
    #[must_use]
    pub fn file_only(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            database: None,
            files: FileStore::new(output_dir),
        }
    }

    /// Database-primary router with the file backend as fallback.
    #[must_use]
    pub fn with_database(database: Database, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            database: Some(database),
            files: FileStore::new(output_dir),
        }
    }

    /// Store a batch of records under a collection name.
    ///
    /// An empty batch is a no-op. Database failures are logged and the
    /// entire batch is routed to the file backend instead.
    pub async fn store(&self, collection: &str, records: &[Record]) {
        if records.is_empty() {
            return;
        }

        if let Some(database) = &self.database {
            match dispatch(database, collection, records).await {
                Ok(written) => {
                    tracing::debug!("Database stored {}/{} '{}' records", written, records.len(), collection);
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        "Database error for '{}': {}; falling back to file storage",
                        collection,
                        e
                    );
                }
            }
        }

        if let Err(e) = self.files.append(collection, records) {
            tracing::error!(
                "File fallback failed for '{}', {} records lost: {}",
                collection,
                records.len(),
                e
            );
        }
    }

    /// Close the underlying database pool, if any.
    pub async fn close(self) {
        if let Some(database) = self.database {
            database.close().await;
        }
    }

    /// The file backend in use (primary or fallback).
    #[must_use]
    pub fn files(&self) -> &FileStore {
        &self.files
    }
}

/// Route a batch to the collection's registered handler.
async fn dispatch(database: &Database, collection: &str, records: &[Record]) -> Result<u64> {
    let pool = database.pool();
    match collection {
        collections::MEMBERS => members::upsert_members(pool, records).await,
        collections::FORUM_TOPICS => topics::upsert_topics(pool, records).await,
        collections::THREAD_POSTS => posts::upsert_posts(pool, records).await,
        other => generic::insert_generic(pool, other, records).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn member(uid: i64) -> Record {
        let mut r = Record::new();
        r.insert("uid".to_string(), json!(uid));
        r.insert("username".to_string(), json!(format!("user{uid}")));
        r
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let tmp = TempDir::new().expect("temp dir");
        let router = StorageRouter::file_only(tmp.path());

        router.store("members", &[]).await;
        assert!(!router.files().collection_path("members").exists());
    }

    #[tokio::test]
    async fn test_file_only_routing() {
        let tmp = TempDir::new().expect("temp dir");
        let router = StorageRouter::file_only(tmp.path());

        router.store("members", &[member(1), member(2)]).await;

        let contents = std::fs::read_to_string(router.files().collection_path("members"))
            .expect("read members.jsonl");
        assert_eq!(contents.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_database_success_skips_file() {
        let tmp = TempDir::new().expect("temp dir");
        let db = Database::connect(":memory:").await.expect("connect");
        db.run_migrations().await.expect("migrate");
        let router = StorageRouter::with_database(db, tmp.path());

        router.store("members", &[member(1)]).await;

        assert!(!router.files().collection_path("members").exists());
    }

    #[tokio::test]
    async fn test_database_failure_falls_back_whole_batch() {
        let tmp = TempDir::new().expect("temp dir");
        // No migrations: every insert fails with "no such table"
        let db = Database::connect(":memory:").await.expect("connect");
        let router = StorageRouter::with_database(db, tmp.path());

        router
            .store("members", &[member(1), member(2), member(3)])
            .await;

        let contents = std::fs::read_to_string(router.files().collection_path("members"))
            .expect("fallback file exists");
        assert_eq!(contents.lines().count(), 3, "all records must survive");
    }

    #[tokio::test]
    async fn test_unregistered_collection_goes_generic() {
        let tmp = TempDir::new().expect("temp dir");
        let db = Database::connect(":memory:").await.expect("connect");
        db.run_migrations().await.expect("migrate");
        let router = StorageRouter::with_database(db, tmp.path());

        let mut forum = Record::new();
        forum.insert("forum_id".to_string(), json!(3));
        forum.insert("forum_name".to_string(), json!("General"));
        router.store("forums", &[forum]).await;

        let router_db = router.database.as_ref().expect("database configured");
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM scraped_data WHERE collection = 'forums'")
                .fetch_one(router_db.pool())
                .await
                .expect("count generic rows");
        assert_eq!(count, 1);
    }
}
