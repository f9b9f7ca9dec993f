//! Forum topic upserts, keyed by the site's `topic_id`.

use crate::error::Result;
use crate::fields;
use bramble_core::Record;
use chrono::Utc;
use sqlx::{Pool, Sqlite};

/// Upsert a batch of topic records inside one transaction.
///
/// Records without a numeric `topic_id` are skipped with a warning.
/// Returns the number of rows written.
///
/// # Errors
/// Returns the underlying `SQLx` error if the transaction fails.
pub async fn upsert_topics(pool: &Pool<Sqlite>, records: &[Record]) -> Result<u64> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    let mut written = 0u64;

    for record in records {
        let Some(topic_id) = fields::as_i64(record, "topic_id") else {
            tracing::warn!("Skipping topic record without numeric topic_id");
            continue;
        };

        sqlx::query(
            "INSERT INTO forum_topics (topic_id, forum_id, topic_title, topic_url, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(topic_id) DO UPDATE SET
                 forum_id = excluded.forum_id,
                 topic_title = excluded.topic_title,
                 topic_url = excluded.topic_url,
                 updated_at = excluded.updated_at",
        )
        .bind(topic_id)
        .bind(fields::as_i64(record, "forum_id"))
        .bind(fields::as_text(record, "topic_title"))
        .bind(fields::as_text(record, "topic_url"))
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        written += 1;
    }

    tx.commit().await?;
    tracing::info!("Upserted {} forum topics", written);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use serde_json::json;

    fn topic(topic_id: i64, title: &str) -> Record {
        let mut r = Record::new();
        r.insert("topic_id".to_string(), json!(topic_id));
        r.insert("forum_id".to_string(), json!(3));
        r.insert("topic_title".to_string(), json!(title));
        r.insert(
            "topic_url".to_string(),
            json!(format!("https://forum.example.com/viewtopic.php?t={topic_id}")),
        );
        r
    }

    #[tokio::test]
    async fn test_sticky_topics_dedupe_across_pages() {
        let db = Database::connect(":memory:").await.expect("connect");
        db.run_migrations().await.expect("migrate");

        // The same sticky topic shows up on every listing page; storing it
        // twice must leave one row with the latest title
        upsert_topics(db.pool(), &[topic(10, "Rules")])
            .await
            .expect("first page");
        upsert_topics(db.pool(), &[topic(10, "Rules [updated]"), topic(11, "Intro")])
            .await
            .expect("second page");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM forum_topics")
            .fetch_one(db.pool())
            .await
            .expect("count topics");
        assert_eq!(count, 2);

        let title: String =
            sqlx::query_scalar("SELECT topic_title FROM forum_topics WHERE topic_id = 10")
                .fetch_one(db.pool())
                .await
                .expect("fetch title");
        assert_eq!(title, "Rules [updated]");
    }
}
