//! HTML extractors for the four record shapes.
//!
//! Each extractor is a pure function from page content to records plus an
//! optional site-reported end marker; the crawl engine consumes only that
//! contract and never touches markup itself.

pub mod forum_index;
pub mod member_profile;
pub mod print_view;
pub mod topic_list;

pub use forum_index::ForumIndexExtractor;
pub use member_profile::MemberProfileExtractor;
pub use print_view::PrintViewExtractor;
pub use topic_list::TopicListExtractor;

use scraper::{ElementRef, Html, Selector};

/// Collapse whitespace; `None` when nothing is left.
pub(crate) fn clean_text(raw: &str) -> Option<String> {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// The site's explicit message block ("does not exist", "access denied").
///
/// Its presence is an end-of-data condition, not a transport error — no
/// retry will change it.
pub(crate) fn error_message(document: &Html) -> Option<String> {
    let selector =
        Selector::parse("div#message div.message-content").expect("valid message selector");
    document
        .select(&selector)
        .next()
        .and_then(|el| clean_text(&el.text().collect::<String>()))
}

/// Element text with `<br>` rendered as a line break, so post bodies keep
/// their paragraph structure.
pub(crate) fn text_with_breaks(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out.trim().to_string()
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if child_el.value().name() == "br" {
                out.push('\n');
            } else {
                collect_text(child_el, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  a   b \n c "), Some("a b c".to_string()));
        assert_eq!(clean_text("   \n\t "), None);
    }

    #[test]
    fn test_error_message_detection() {
        let html = Html::parse_document(
            r#"<div id="message"><div class="message-content">The requested topic does not exist.</div></div>"#,
        );
        assert_eq!(
            error_message(&html),
            Some("The requested topic does not exist.".to_string())
        );

        let plain = Html::parse_document("<div class=\"post\">fine</div>");
        assert_eq!(error_message(&plain), None);
    }

    #[test]
    fn test_text_with_breaks() {
        let html = Html::parse_document("<div id=\"c\">line one<br>line two<br/>line three</div>");
        let selector = Selector::parse("#c").expect("valid selector");
        let element = html.select(&selector).next().expect("find element");
        assert_eq!(text_with_breaks(element), "line one\nline two\nline three");
    }
}
