//! Thread print-view extractor.
//!
//! The print view lists every post in a flat `div.post` sequence — far
//! cheaper to parse than the themed topic view, and the same markup at
//! every pagination offset.

use super::{clean_text, error_message, text_with_breaks};
use crate::cursor::CrawlCursor;
use crate::engine::{ExtractOutcome, PageExtractor};
use bramble_core::Record;
use scraper::{Html, Selector};
use serde_json::json;

pub struct PrintViewExtractor;

impl PageExtractor for PrintViewExtractor {
    fn extract(&self, content: &str, _cursor: &CrawlCursor) -> ExtractOutcome {
        let document = Html::parse_document(content);

        if let Some(message) = error_message(&document) {
            return ExtractOutcome {
                records: Vec::new(),
                end_marker: Some(message),
            };
        }

        let post_selector = Selector::parse("div.post").expect("valid post selector");
        let author_link_selector =
            Selector::parse(r#"div.author a[href*="memberlist.php?mode=viewprofile"]"#)
                .expect("valid author link selector");
        let author_name_selector =
            Selector::parse("div.author strong").expect("valid author name selector");
        let date_selector = Selector::parse("div.date strong").expect("valid date selector");
        let content_selector = Selector::parse("div.content").expect("valid content selector");

        let mut records = Vec::new();

        for post in document.select(&post_selector) {
            let mut record = Record::new();

            let author_link = post.select(&author_link_selector).next();
            let author = author_link
                .map(|el| el.text().collect::<String>())
                .and_then(|text| clean_text(&text))
                .or_else(|| {
                    post.select(&author_name_selector)
                        .next()
                        .and_then(|el| clean_text(&el.text().collect::<String>()))
                });
            if let Some(author) = author {
                record.insert("author".to_string(), json!(author));
            }

            if let Some(author_id) = author_link
                .and_then(|el| el.value().attr("href"))
                .and_then(uid_from_href)
            {
                record.insert("author_id".to_string(), json!(author_id));
            }

            if let Some(timestamp) = post
                .select(&date_selector)
                .next()
                .and_then(|el| clean_text(&el.text().collect::<String>()))
            {
                record.insert("timestamp".to_string(), json!(timestamp));
            }

            let body = post
                .select(&content_selector)
                .next()
                .map(text_with_breaks)
                .unwrap_or_default();
            record.insert("content".to_string(), json!(body));

            records.push(record);
        }

        ExtractOutcome {
            records,
            end_marker: None,
        }
    }
}

fn uid_from_href(href: &str) -> Option<String> {
    let tail = href.split("u=").nth(1)?;
    let uid: String = tail.chars().take_while(char::is_ascii_digit).collect();
    if uid.is_empty() {
        None
    } else {
        Some(uid)
    }
}
