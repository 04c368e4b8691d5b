//! Cursor pagination
//!
//! List endpoints describe neighbouring pages in the `Link` header:
//!
//! ```text
//! <https://sentry.io/api/0/organizations/acme/teams/?&cursor=100:-1:1>; rel="previous"; results="false"; cursor="100:-1:1",
//! <https://sentry.io/api/0/organizations/acme/teams/?&cursor=100:1:0>; rel="next"; results="true"; cursor="100:1:0"
//! ```
//!
//! Only the `next` entry matters; its `results` flag says whether following
//! it yields anything.

use reconcile::Cursor;
use regex::Regex;
use std::sync::LazyLock;

static LINK_ENTRY: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"<(?P<url>[^>]*)>\s*;\s*rel="(?P<rel>[^"]+)"\s*;\s*results="(?P<results>true|false)"\s*;\s*cursor="(?P<cursor>[^"]*)""#,
    )
    .ok()
});

/// One entry of a `Link` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    pub url: String,
    pub rel: String,
    pub results: bool,
    pub cursor: String,
}

/// Parse every well-formed entry of a `Link` header.
pub fn parse_link_header(header: &str) -> Vec<LinkEntry> {
    let Some(pattern) = LINK_ENTRY.as_ref() else {
        return Vec::new();
    };

    pattern
        .captures_iter(header)
        .map(|caps| LinkEntry {
            url: caps["url"].to_string(),
            rel: caps["rel"].to_string(),
            results: &caps["results"] == "true",
            cursor: caps["cursor"].to_string(),
        })
        .collect()
}

/// The cursor for the next page, if the header names one.
pub fn next_cursor(header: Option<&str>) -> Option<Cursor> {
    parse_link_header(header?)
        .into_iter()
        .find(|entry| entry.rel == "next")
        .map(|entry| Cursor::new(entry.cursor, entry.results))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = concat!(
        r#"<https://sentry.io/api/0/organizations/acme/teams/?&cursor=100:-1:1>; rel="previous"; results="false"; cursor="100:-1:1", "#,
        r#"<https://sentry.io/api/0/organizations/acme/teams/?&cursor=100:1:0>; rel="next"; results="true"; cursor="100:1:0""#
    );

    #[test]
    fn test_parse_both_entries() {
        let entries = parse_link_header(HEADER);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].rel, "previous");
        assert!(!entries[0].results);
        assert_eq!(entries[1].cursor, "100:1:0");
        assert!(entries[1].url.ends_with("cursor=100:1:0"));
    }

    #[test]
    fn test_next_cursor_has_more() {
        let cursor = next_cursor(Some(HEADER)).unwrap();
        assert_eq!(cursor, Cursor::new("100:1:0", true));
    }

    #[test]
    fn test_next_cursor_exhausted() {
        let header = r#"<https://sentry.io/api/0/x/?&cursor=100:2:0>; rel="next"; results="false"; cursor="100:2:0""#;
        let cursor = next_cursor(Some(header)).unwrap();
        assert!(!cursor.has_more);
    }

    #[test]
    fn test_missing_or_garbage_header() {
        assert!(next_cursor(None).is_none());
        assert!(next_cursor(Some("garbage")).is_none());
        assert!(parse_link_header("").is_empty());
    }
}
