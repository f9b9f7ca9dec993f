//! Shared types used across the bramble crates.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An extracted record: an opaque bag of field name → scalar value.
///
/// Records are produced by the page extractors and consumed by the storage
/// router; the crawl engine never inspects individual fields beyond
/// computing page signatures. A `BTreeMap` keeps field order deterministic
/// so serialized forms are stable.
pub type Record = BTreeMap<String, Value>;

/// Merge caller-supplied parent context (forum_id, topic_id, ...) into a
/// record. Existing fields win; context only fills gaps.
pub fn merge_context(record: &mut Record, context: &Record) {
    for (key, value) in context {
        record
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
}

/// Well-known collection names routed to dedicated storage handlers.
pub mod collections {
    /// Discovered forums (terminal records, no pagination).
    pub const FORUMS: &str = "forums";
    /// Topic listings per forum.
    pub const FORUM_TOPICS: &str = "forum_topics";
    /// Posts harvested from thread print views.
    pub const THREAD_POSTS: &str = "thread_posts";
    /// Member profiles harvested by UID enumeration.
    pub const MEMBERS: &str = "members";
}

/// Result of a single page fetch, regardless of transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    /// Page body as text
    pub content: String,
    /// HTTP status code
    pub status: u16,
    /// URL after redirects
    pub final_url: String,
}

impl FetchResult {
    /// True when the response carries a success status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Authentication state of a session, re-derived each run by probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No credentials, or credentials rejected by the site
    Unauthenticated,
    /// Strict probe confirmed an authenticated session
    Authenticated,
    /// An anti-bot interstitial is interposed before real content
    Challenged,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_context_fills_missing_fields() {
        let mut record = Record::new();
        record.insert("author".to_string(), json!("alice"));

        let mut context = Record::new();
        context.insert("forum_id".to_string(), json!(7));
        context.insert("topic_id".to_string(), json!(42));

        merge_context(&mut record, &context);

        assert_eq!(record.get("forum_id"), Some(&json!(7)));
        assert_eq!(record.get("topic_id"), Some(&json!(42)));
        assert_eq!(record.get("author"), Some(&json!("alice")));
    }

    #[test]
    fn test_merge_context_keeps_existing_fields() {
        let mut record = Record::new();
        record.insert("forum_id".to_string(), json!(1));

        let mut context = Record::new();
        context.insert("forum_id".to_string(), json!(99));

        merge_context(&mut record, &context);

        assert_eq!(record.get("forum_id"), Some(&json!(1)));
    }

    #[test]
    fn test_fetch_result_success() {
        let ok = FetchResult {
            content: String::new(),
            status: 200,
            final_url: "https://forum.example.com/".to_string(),
        };
        assert!(ok.is_success());

        let blocked = FetchResult {
            status: 403,
            ..ok.clone()
        };
        assert!(!blocked.is_success());
    }
}
