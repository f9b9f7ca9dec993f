//! Member profile upserts.
//!
//! Members are keyed by their site-assigned `uid`; a re-crawl replaces the
//! mutable profile fields in place.

use crate::error::Result;
use crate::fields;
use bramble_core::Record;
use chrono::Utc;
use sqlx::{Pool, Sqlite};

/// Upsert a batch of member records inside one transaction.
///
/// Records without a numeric `uid` are skipped with a warning — one
/// malformed record must not sink the batch. Returns the number of rows
/// written.
///
/// # Errors
/// Returns the underlying `SQLx` error if the transaction fails; the
/// caller decides whether to fall back.
pub async fn upsert_members(pool: &Pool<Sqlite>, records: &[Record]) -> Result<u64> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    let mut written = 0u64;

    for record in records {
        let Some(uid) = fields::as_i64(record, "uid") else {
            tracing::warn!("Skipping member record without numeric uid");
            continue;
        };
        let Some(username) = fields::as_text(record, "username") else {
            tracing::warn!("Skipping member record {} without username", uid);
            continue;
        };

        sqlx::query(
            "INSERT INTO members (uid, username, rank, join_date, total_posts, location,
                                  warnings, contact, signature, avatar, links, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(uid) DO UPDATE SET
                 username = excluded.username,
                 rank = excluded.rank,
                 join_date = excluded.join_date,
                 total_posts = excluded.total_posts,
                 location = excluded.location,
                 warnings = excluded.warnings,
                 contact = excluded.contact,
                 signature = excluded.signature,
                 avatar = excluded.avatar,
                 links = excluded.links,
                 updated_at = excluded.updated_at",
        )
        .bind(uid)
        .bind(username)
        .bind(fields::as_text(record, "rank"))
        .bind(fields::as_text(record, "join_date"))
        .bind(fields::as_text(record, "total_posts"))
        .bind(fields::as_text(record, "location"))
        .bind(fields::as_text(record, "warnings"))
        .bind(fields::as_text(record, "contact"))
        .bind(fields::as_text(record, "signature"))
        .bind(fields::as_text(record, "avatar"))
        .bind(fields::as_json_text(record, "links"))
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        written += 1;
    }

    tx.commit().await?;
    tracing::info!("Upserted {} members", written);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use serde_json::json;

    async fn test_db() -> Database {
        let db = Database::connect(":memory:").await.expect("connect");
        db.run_migrations().await.expect("migrate");
        db
    }

    fn member(uid: i64, username: &str, rank: &str) -> Record {
        let mut r = Record::new();
        r.insert("uid".to_string(), json!(uid));
        r.insert("username".to_string(), json!(username));
        r.insert("rank".to_string(), json!(rank));
        r
    }

    #[tokio::test]
    async fn test_upsert_inserts_and_updates() {
        let db = test_db().await;

        upsert_members(db.pool(), &[member(1, "alice", "Member")])
            .await
            .expect("first upsert");
        upsert_members(db.pool(), &[member(1, "alice", "Moderator")])
            .await
            .expect("second upsert");

        let (count, rank): (i64, String) =
            sqlx::query_as("SELECT COUNT(*), MAX(rank) FROM members")
                .fetch_one(db.pool())
                .await
                .expect("query members");

        assert_eq!(count, 1);
        assert_eq!(rank, "Moderator");
    }

    #[tokio::test]
    async fn test_malformed_record_does_not_sink_batch() {
        let db = test_db().await;

        let mut malformed = Record::new();
        malformed.insert("username".to_string(), json!("ghost"));

        let written = upsert_members(db.pool(), &[malformed, member(2, "bob", "Member")])
            .await
            .expect("upsert batch");
        assert_eq!(written, 1);
    }
}
