//! Forum discovery from the site index.
//!
//! Terminal records — the index is a single page, no pagination.

use super::clean_text;
use crate::cursor::CrawlCursor;
use crate::engine::{ExtractOutcome, PageExtractor};
use crate::urls;
use bramble_core::Record;
use scraper::{Html, Selector};
use serde_json::json;
use std::collections::HashSet;
use url::Url;

pub struct ForumIndexExtractor {
    base: Url,
}

impl ForumIndexExtractor {
    #[must_use]
    pub fn new(base: Url) -> Self {
        Self { base }
    }
}

impl PageExtractor for ForumIndexExtractor {
    fn extract(&self, content: &str, _cursor: &CrawlCursor) -> ExtractOutcome {
        let document = Html::parse_document(content);
        let anchor_selector = Selector::parse("a[href]").expect("valid anchor selector");

        let mut seen: HashSet<i64> = HashSet::new();
        let mut records = Vec::new();

        for anchor in document.select(&anchor_selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            // Forum links carry an f= parameter; topic links also carry
            // t= and belong to the listing walk instead
            if urls::query_param_int(&self.base, href, "t").is_some() {
                continue;
            }
            let Some(forum_id) = urls::query_param_int(&self.base, href, "f") else {
                continue;
            };
            let Some(name) = clean_text(&anchor.text().collect::<String>()) else {
                continue;
            };
            if !seen.insert(forum_id) {
                continue;
            }

            let forum_url = self
                .base
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string());

            let mut record = Record::new();
            record.insert("forum_id".to_string(), json!(forum_id));
            record.insert("forum_name".to_string(), json!(name));
            record.insert("forum_url".to_string(), json!(forum_url));
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

    #[test]
    fn test_discovers_unique_forums() {
        let html = r#"
            <a href="./viewforum.php?f=2">Announcements</a>
            <a href="./viewforum.php?f=2">Announcements (again)</a>
            <a href="./viewforum.php?f=5">Marketplace</a>
            <a href="./viewtopic.php?f=5&t=9">A topic link</a>
            <a href="./faq.php">FAQ</a>
        "#;
        let extractor =
            ForumIndexExtractor::new(Url::parse("https://forum.example.com/").expect("base"));
        let outcome = extractor.extract(html, &CrawlCursor::new(0, 0, None));

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].get("forum_id"), Some(&json!(2)));
        assert_eq!(
            outcome.records[0].get("forum_name"),
            Some(&json!("Announcements"))
        );
        assert_eq!(outcome.records[1].get("forum_id"), Some(&json!(5)));
    }
}
