//! Thread post upserts.
//!
//! Print-view posts carry no site-assigned id, so the natural key is
//! `(topic_id, post_no)` where `post_no` is the page offset plus the
//! post's position within the page — stable across re-crawls of the same
//! thread.

use crate::error::Result;
use crate::fields;
use bramble_core::Record;
use chrono::Utc;
use sqlx::{Pool, Sqlite};

/// Upsert a batch of post records inside one transaction.
///
/// Records without `topic_id` and `post_no` are skipped with a warning.
/// Returns the number of rows written.
///
/// # Errors
/// Returns the underlying `SQLx` error if the transaction fails.
pub async fn upsert_posts(pool: &Pool<Sqlite>, records: &[Record]) -> Result<u64> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    let mut written = 0u64;

    for record in records {
        let Some(topic_id) = fields::as_i64(record, "topic_id") else {
            tracing::warn!("Skipping post record without numeric topic_id");
            continue;
        };
        let Some(post_no) = fields::as_i64(record, "post_no") else {
            tracing::warn!("Skipping post record in topic {} without post_no", topic_id);
            continue;
        };

        sqlx::query(
            "INSERT INTO thread_posts (topic_id, post_no, forum_id, author, author_id,
                                       posted_at, content, topic_title, page_offset, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(topic_id, post_no) DO UPDATE SET
                 forum_id = excluded.forum_id,
                 author = excluded.author,
                 author_id = excluded.author_id,
                 posted_at = excluded.posted_at,
                 content = excluded.content,
                 topic_title = excluded.topic_title,
                 page_offset = excluded.page_offset,
                 updated_at = excluded.updated_at",
        )
        .bind(topic_id)
        .bind(post_no)
        .bind(fields::as_i64(record, "forum_id"))
        .bind(fields::as_text(record, "author"))
        .bind(fields::as_text(record, "author_id"))
        .bind(fields::as_text(record, "timestamp"))
        .bind(fields::as_text(record, "content"))
        .bind(fields::as_text(record, "topic_title"))
        .bind(fields::as_i64(record, "page_offset"))
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        written += 1;
    }

    tx.commit().await?;
    tracing::info!("Upserted {} thread posts", written);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use serde_json::json;

    fn post(topic_id: i64, post_no: i64, content: &str) -> Record {
        let mut r = Record::new();
        r.insert("topic_id".to_string(), json!(topic_id));
        r.insert("post_no".to_string(), json!(post_no));
        r.insert("author".to_string(), json!("alice"));
        r.insert("timestamp".to_string(), json!("Mon Jan 01, 2026 9:00 am"));
        r.insert("content".to_string(), json!(content));
        r
    }

    #[tokio::test]
    async fn test_recrawl_is_idempotent() {
        let db = Database::connect(":memory:").await.expect("connect");
        db.run_migrations().await.expect("migrate");

        let batch = vec![post(5, 0, "first"), post(5, 1, "second")];
        upsert_posts(db.pool(), &batch).await.expect("first crawl");
        upsert_posts(db.pool(), &batch).await.expect("re-crawl");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM thread_posts")
            .fetch_one(db.pool())
            .await
            .expect("count posts");
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_edited_post_replaced_in_place() {
        let db = Database::connect(":memory:").await.expect("connect");
        db.run_migrations().await.expect("migrate");

        upsert_posts(db.pool(), &[post(5, 0, "original")])
            .await
            .expect("first crawl");
        upsert_posts(db.pool(), &[post(5, 0, "edited")])
            .await
            .expect("second crawl");

        let content: String = sqlx::query_scalar(
            "SELECT content FROM thread_posts WHERE topic_id = 5 AND post_no = 0",
        )
        .fetch_one(db.pool())
        .await
        .expect("fetch content");
        assert_eq!(content, "edited");
    }
}
