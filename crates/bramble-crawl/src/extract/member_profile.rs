//! Member profile extractor.
//!
//! Profiles are addressed by UID (the walk offset); labeled fields live in
//! `dt`/`dd` pairs and the rest is scattered page furniture.

use super::{clean_text, error_message, text_with_breaks};
use crate::cursor::CrawlCursor;
use crate::engine::{ExtractOutcome, PageExtractor};
use bramble_core::Record;
use scraper::{ElementRef, Html, Selector};
use serde_json::json;
use std::collections::BTreeSet;

/// Labeled profile fields harvested from definition lists.
const LABELED_FIELDS: &[(&str, &str)] = &[
    ("rank", "Rank"),
    ("join_date", "Joined"),
    ("total_posts", "Total posts"),
    ("location", "Location"),
    ("warnings", "Warnings"),
    ("contact", "Contact"),
];

pub struct MemberProfileExtractor;

impl PageExtractor for MemberProfileExtractor {
    fn extract(&self, content: &str, cursor: &CrawlCursor) -> ExtractOutcome {
        let document = Html::parse_document(content);

        if let Some(message) = error_message(&document) {
            return ExtractOutcome {
                records: Vec::new(),
                end_marker: Some(message),
            };
        }

        let Some(username) = extract_username(&document) else {
            tracing::warn!("UID {}: could not locate username", cursor.offset);
            return ExtractOutcome::default();
        };

        let mut record = Record::new();
        record.insert("uid".to_string(), json!(cursor.offset));
        record.insert("username".to_string(), json!(username));

        for (field, label) in LABELED_FIELDS {
            if let Some(value) = labeled_value(&document, label) {
                record.insert((*field).to_string(), json!(value));
            }
        }

        let signature_selector =
            Selector::parse("div.signature, div#profile-field-bio").expect("valid signature selector");
        if let Some(signature) = document
            .select(&signature_selector)
            .next()
            .map(text_with_breaks)
            .filter(|text| !text.is_empty())
        {
            record.insert("signature".to_string(), json!(signature));
        }

        let avatar_selector = Selector::parse(r#"img[class*="avatar"]"#).expect("valid avatar selector");
        if let Some(avatar) = document
            .select(&avatar_selector)
            .next()
            .and_then(|el| el.value().attr("src"))
        {
            record.insert("avatar".to_string(), json!(avatar));
        }

        let links = outbound_links(&document);
        if !links.is_empty() {
            record.insert("links".to_string(), json!(links));
        }

        ExtractOutcome {
            records: vec![record],
            end_marker: None,
        }
    }
}

fn extract_username(document: &Html) -> Option<String> {
    let selector = Selector::parse("h2.username, h3.username, a.username, span.username")
        .expect("valid username selector");
    document
        .select(&selector)
        .next()
        .and_then(|el| clean_text(&el.text().collect::<String>()))
}

/// Value of the `dd` following the `dt` whose text contains the label.
fn labeled_value(document: &Html, label: &str) -> Option<String> {
    let dt_selector = Selector::parse("dt").expect("valid dt selector");
    let needle = label.to_lowercase();

    for dt in document.select(&dt_selector) {
        let text = dt.text().collect::<String>().to_lowercase();
        if !text.contains(&needle) {
            continue;
        }

        let dd = dt
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "dd")?;
        return clean_text(&dd.text().collect::<String>());
    }
    None
}

/// External and mail links on the profile, sorted and deduplicated.
fn outbound_links(document: &Html) -> Vec<String> {
    let anchor_selector = Selector::parse("a[href]").expect("valid anchor selector");
    let links: BTreeSet<String> = document
        .select(&anchor_selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter(|href| href.starts_with("http") || href.starts_with("mailto:"))
        .map(str::to_string)
        .collect();
    links.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = r#"
        <h2 class="username">shadow_trader</h2>
        <dl>
          <dt>Rank:</dt><dd>Vendor</dd>
          <dt>Joined:</dt><dd>Tue Mar 02, 2021 4:12 pm</dd>
          <dt>Total posts:</dt><dd>1204</dd>
          <dt>Location:</dt><dd>undisclosed</dd>
        </dl>
        <div class="signature">contact me<br>on the usual channel</div>
        <img class="avatar-img" src="./download/file.php?avatar=53.png">
        <a href="https://paste.example.org/abc">paste</a>
        <a href="mailto:trader@example.org">mail</a>
        <a href="./memberlist.php?mode=viewprofile&u=53">self</a>
    "#;

    fn cursor_at(uid: u64) -> CrawlCursor {
        CrawlCursor::new(uid, 1, None)
    }

    #[test]
    fn test_extracts_profile_fields() {
        let outcome = MemberProfileExtractor.extract(PROFILE, &cursor_at(53));
        assert_eq!(outcome.records.len(), 1);

        let record = &outcome.records[0];
        assert_eq!(record.get("uid"), Some(&json!(53)));
        assert_eq!(record.get("username"), Some(&json!("shadow_trader")));
        assert_eq!(record.get("rank"), Some(&json!("Vendor")));
        assert_eq!(record.get("total_posts"), Some(&json!("1204")));
        assert_eq!(record.get("location"), Some(&json!("undisclosed")));
        assert_eq!(
            record.get("signature"),
            Some(&json!("contact me\non the usual channel"))
        );
        assert_eq!(
            record.get("avatar"),
            Some(&json!("./download/file.php?avatar=53.png"))
        );
        assert_eq!(
            record.get("links"),
            Some(&json!([
                "https://paste.example.org/abc",
                "mailto:trader@example.org"
            ]))
        );
    }

    #[test]
    fn test_missing_username_yields_nothing() {
        let outcome =
            MemberProfileExtractor.extract("<html><body>spinner</body></html>", &cursor_at(9));
        assert!(outcome.records.is_empty());
        assert!(outcome.end_marker.is_none());
    }

    #[test]
    fn test_error_box_terminates_walk() {
        let html = r#"<div id="message"><div class="message-content">The requested user does not exist.</div></div>"#;
        let outcome = MemberProfileExtractor.extract(html, &cursor_at(9));
        assert_eq!(
            outcome.end_marker.as_deref(),
            Some("The requested user does not exist.")
        );
    }
}
