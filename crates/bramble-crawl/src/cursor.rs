//! Crawl cursor and page signatures.

use bramble_core::Record;

/// Offset cursor driving page-URL construction.
///
/// Strictly monotonic: the walk never revisits an offset once passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlCursor {
    /// Current page offset
    pub offset: u64,
    /// Offset increment per page
    pub step: u64,
    /// Inclusive hard stop; offsets beyond it terminate the walk
    pub stop: Option<u64>,
}

impl CrawlCursor {
    #[must_use]
    pub fn new(start: u64, step: u64, stop: Option<u64>) -> Self {
        Self {
            offset: start,
            step,
            stop,
        }
    }

    /// Advance to the next offset.
    pub fn advance(&mut self) {
        self.offset += self.step;
    }

    /// True once the cursor has moved beyond the configured hard stop.
    #[must_use]
    pub fn past_stop(&self) -> bool {
        matches!(self.stop, Some(stop) if self.offset > stop)
    }
}

/// Order-sensitive digest of a page's extracted records.
///
/// Built from the canonical serialization of each record in extraction
/// order. Sites that clamp the offset past the last real page re-serve
/// that page verbatim; equal signatures on consecutive pages mean no
/// further distinct content exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSignature(Vec<String>);

impl PageSignature {
    /// Digest an ordered record list.
    #[must_use]
    pub fn of(records: &[Record]) -> Self {
        Self(
            records
                .iter()
                .map(|record| serde_json::to_string(record).unwrap_or_default())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(author: &str, content: &str) -> Record {
        let mut r = Record::new();
        r.insert("author".to_string(), json!(author));
        r.insert("content".to_string(), json!(content));
        r
    }

    #[test]
    fn test_cursor_advance_is_monotonic() {
        let mut cursor = CrawlCursor::new(0, 10, None);
        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.offset, 20);
    }

    #[test]
    fn test_cursor_stop_is_inclusive() {
        let mut cursor = CrawlCursor::new(0, 10, Some(10));
        assert!(!cursor.past_stop());
        cursor.advance();
        assert!(!cursor.past_stop(), "offset == stop is still in range");
        cursor.advance();
        assert!(cursor.past_stop());
    }

    #[test]
    fn test_signature_equality() {
        let page = vec![record("alice", "hi"), record("bob", "hello")];
        assert_eq!(PageSignature::of(&page), PageSignature::of(&page.clone()));
    }

    #[test]
    fn test_signature_is_order_sensitive() {
        let forward = vec![record("alice", "hi"), record("bob", "hello")];
        let reversed: Vec<Record> = forward.iter().rev().cloned().collect();
        assert_ne!(PageSignature::of(&forward), PageSignature::of(&reversed));
    }

    #[test]
    fn test_signature_detects_content_change() {
        let first = vec![record("alice", "hi")];
        let second = vec![record("alice", "edited")];
        assert_ne!(PageSignature::of(&first), PageSignature::of(&second));
    }
}
