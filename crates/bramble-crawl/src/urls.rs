//! Page-URL construction for the forum's offset-addressed routes.

use url::Url;

/// Rewrite a topic URL to its print view.
///
/// Forces `view=print` and strips any stale `start` offset so the walk
/// begins from the first page.
#[must_use]
pub fn ensure_print_view(base: &Url, topic_href: &str) -> Option<String> {
    let mut url = base.join(topic_href).ok()?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "view" && key != "start")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("view", "print");
    Some(url.to_string())
}

/// Apply a pagination offset to a page URL. Offset zero leaves the URL
/// untouched; a previous `start` parameter is replaced.
#[must_use]
pub fn with_offset(page_url: &str, offset: u64) -> String {
    if offset == 0 {
        return page_url.to_string();
    }

    let Ok(mut url) = Url::parse(page_url) else {
        return page_url.to_string();
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "start")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("start", &offset.to_string());
    url.to_string()
}

/// The site index (forum discovery entry point).
#[must_use]
pub fn index_url(base: &Url) -> String {
    base.join("index.php")
        .map(|u| u.to_string())
        .unwrap_or_else(|_| base.to_string())
}

/// A forum's topic listing at a pagination offset.
#[must_use]
pub fn forum_page_url(base: &Url, forum_id: i64, offset: u64) -> String {
    let path = format!("viewforum.php?f={forum_id}");
    let url = base
        .join(&path)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| path);
    with_offset(&url, offset)
}

/// A member profile page by UID.
#[must_use]
pub fn profile_url(base: &Url, uid: u64) -> String {
    let path = format!("memberlist.php?mode=viewprofile&u={uid}");
    base.join(&path)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| path)
}

/// A topic view URL from its identifiers.
#[must_use]
pub fn topic_url(base: &Url, forum_id: i64, topic_id: i64) -> String {
    let path = format!("viewtopic.php?f={forum_id}&t={topic_id}");
    base.join(&path)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| path)
}

/// First numeric value of a query parameter in an href, resolved against
/// the base URL.
#[must_use]
pub fn query_param_int(base: &Url, href: &str, key: &str) -> Option<i64> {
    let url = base.join(href).ok()?;
    url.query_pairs()
        .filter(|(k, _)| k == key)
        .find_map(|(_, value)| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://forum.example.com/").expect("parse base URL")
    }

    #[test]
    fn test_ensure_print_view_appends_param() {
        let url = ensure_print_view(&base(), "viewtopic.php?f=3&t=42").expect("build print view");
        assert_eq!(
            url,
            "https://forum.example.com/viewtopic.php?f=3&t=42&view=print"
        );
    }

    #[test]
    fn test_ensure_print_view_strips_stale_offset() {
        let url = ensure_print_view(&base(), "viewtopic.php?f=3&t=42&start=20&view=print")
            .expect("build print view");
        assert!(!url.contains("start="));
        assert!(url.ends_with("view=print"));
    }

    #[test]
    fn test_ensure_print_view_is_idempotent() {
        let once = ensure_print_view(&base(), "viewtopic.php?f=3&t=42").expect("first pass");
        let twice = ensure_print_view(&base(), &once).expect("second pass");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_with_offset_zero_is_identity() {
        let url = "https://forum.example.com/viewtopic.php?t=42&view=print";
        assert_eq!(with_offset(url, 0), url);
    }

    #[test]
    fn test_with_offset_replaces_previous() {
        let url = "https://forum.example.com/viewtopic.php?t=42&view=print";
        let page2 = with_offset(url, 10);
        let page3 = with_offset(&page2, 20);
        assert!(page3.contains("start=20"));
        assert!(!page3.contains("start=10"));
    }

    #[test]
    fn test_forum_page_url() {
        assert_eq!(
            forum_page_url(&base(), 3, 0),
            "https://forum.example.com/viewforum.php?f=3"
        );
        assert_eq!(
            forum_page_url(&base(), 3, 30),
            "https://forum.example.com/viewforum.php?f=3&start=30"
        );
    }

    #[test]
    fn test_profile_url() {
        assert_eq!(
            profile_url(&base(), 7),
            "https://forum.example.com/memberlist.php?mode=viewprofile&u=7"
        );
    }

    #[test]
    fn test_query_param_int() {
        assert_eq!(
            query_param_int(&base(), "./viewtopic.php?f=3&t=42", "t"),
            Some(42)
        );
        assert_eq!(
            query_param_int(&base(), "./viewtopic.php?f=3&t=42", "f"),
            Some(3)
        );
        assert_eq!(query_param_int(&base(), "./viewtopic.php?f=3", "t"), None);
        assert_eq!(
            query_param_int(&base(), "./viewtopic.php?t=abc", "t"),
            None,
            "non-numeric values are ignored"
        );
    }
}
