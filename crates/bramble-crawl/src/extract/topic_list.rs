//! Forum topic-listing extractor.
//!
//! Listing pages link each topic several times (title, unread marker,
//! last-post arrow); anchors are deduplicated by topic id with the first
//! titled occurrence winning.

use super::clean_text;
use crate::cursor::CrawlCursor;
use crate::engine::{ExtractOutcome, PageExtractor};
use crate::urls;
use bramble_core::Record;
use scraper::{Html, Selector};
use serde_json::json;
use std::collections::HashSet;
use url::Url;

/// Site-provided markers that a forum has run out of topics.
const EMPTY_MARKERS: &[&str] = &["No topics", "No posts"];

pub struct TopicListExtractor {
    base: Url,
}

impl TopicListExtractor {
    #[must_use]
    pub fn new(base: Url) -> Self {
        Self { base }
    }
}

impl PageExtractor for TopicListExtractor {
    fn extract(&self, content: &str, _cursor: &CrawlCursor) -> ExtractOutcome {
        if let Some(marker) = EMPTY_MARKERS.iter().find(|m| content.contains(*m)) {
            return ExtractOutcome {
                records: Vec::new(),
                end_marker: Some((*marker).to_string()),
            };
        }

        let document = Html::parse_document(content);
        let anchor_selector = Selector::parse("a[href]").expect("valid anchor selector");

        let mut seen: HashSet<i64> = HashSet::new();
        let mut records = Vec::new();

        for anchor in document.select(&anchor_selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(topic_id) = urls::query_param_int(&self.base, href, "t") else {
                continue;
            };
            let Some(title) = clean_text(&anchor.text().collect::<String>()) else {
                continue;
            };
            if !seen.insert(topic_id) {
                continue;
            }

            let topic_url = self
                .base
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string());

            let mut record = Record::new();
            record.insert("topic_id".to_string(), json!(topic_id));
            record.insert("topic_title".to_string(), json!(title));
            record.insert("topic_url".to_string(), json!(topic_url));
            records.push(record);
        }

        ExtractOutcome {
            records,
            end_marker: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> TopicListExtractor {
        TopicListExtractor::new(Url::parse("https://forum.example.com/").expect("parse base"))
    }

    fn cursor() -> CrawlCursor {
        CrawlCursor::new(0, 30, None)
    }

    #[test]
    fn test_extracts_unique_topics() {
        let html = r#"
            <a href="./viewtopic.php?f=3&t=42">Interesting thread</a>
            <a href="./viewtopic.php?f=3&t=42&p=900#p900">Re: Interesting thread</a>
            <a href="./viewtopic.php?f=3&t=43">Another thread</a>
            <a href="./viewforum.php?f=3">General</a>
        "#;
        let outcome = extractor().extract(html, &cursor());

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].get("topic_id"), Some(&json!(42)));
        assert_eq!(
            outcome.records[0].get("topic_title"),
            Some(&json!("Interesting thread"))
        );
        assert_eq!(
            outcome.records[0].get("topic_url"),
            Some(&json!("https://forum.example.com/viewtopic.php?f=3&t=42"))
        );
        assert_eq!(outcome.records[1].get("topic_id"), Some(&json!(43)));
    }

    #[test]
    fn test_untitled_anchors_are_skipped() {
        let html = r#"<a href="./viewtopic.php?f=3&t=42"><img src="icon.gif"></a>"#;
        let outcome = extractor().extract(html, &cursor());
        assert!(outcome.records.is_empty());
    }

    #[test]
    fn test_empty_state_marker_terminates() {
        let html = "<div class=\"forumbg\">No topics or posts met your criteria</div>";
        let outcome = extractor().extract(html, &cursor());
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.end_marker.as_deref(), Some("No topics"));
    }
}
