//! Generic storage for collections without a dedicated handler.
//!
//! Each record is appended as a serialized payload tagged with its
//! collection name; no natural-key semantics apply.

use crate::error::Result;
use bramble_core::Record;
use chrono::Utc;
use sqlx::{Pool, Sqlite};

/// Append a batch of records to the `scraped_data` table.
///
/// # Errors
/// Returns the underlying `SQLx` or serialization error if the
/// transaction fails.
pub async fn insert_generic(
    pool: &Pool<Sqlite>,
    collection: &str,
    records: &[Record],
) -> Result<u64> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    let mut written = 0u64;

    for record in records {
        let payload = serde_json::to_string(record)?;

        sqlx::query("INSERT INTO scraped_data (collection, payload, created_at) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(payload)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        written += 1;
    }

    tx.commit().await?;
    tracing::info!("Stored {} records into collection '{}'", written, collection);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use serde_json::json;

    #[tokio::test]
    async fn test_generic_insert_tags_collection() {
        let db = Database::connect(":memory:").await.expect("connect");
        db.run_migrations().await.expect("migrate");

        let mut record = Record::new();
        record.insert("forum_id".to_string(), json!(3));
        record.insert("forum_name".to_string(), json!("General"));

        insert_generic(db.pool(), "forums", &[record.clone(), record])
            .await
            .expect("insert generic");

        let (count, collection): (i64, String) =
            sqlx::query_as("SELECT COUNT(*), MAX(collection) FROM scraped_data")
                .fetch_one(db.pool())
                .await
                .expect("query scraped_data");
        assert_eq!(count, 2);
        assert_eq!(collection, "forums");
    }
}
