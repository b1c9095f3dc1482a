//! Continuation rules for the three paging styles in use.
//!
//! - GitHub: `Link` header with `rel="next"` URLs.
//! - CrowdIn: `offset`/`limit`, done when a page comes back short.
//! - Zendesk: `page`/`per_page` up to a reported `page_count`.

/// Pagination information extracted from a `Link` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPagination {
    /// URL of the next page (from `rel="next"`).
    pub next_url: Option<String>,
    /// The last page number (from `rel="last"`).
    pub last_page: Option<u32>,
}

/// Parse a `Link` header.
///
/// GitHub Link headers look like:
/// `<https://api.github.com/repositories/1/issues?page=2>; rel="next", <...&page=3>; rel="last"`
pub fn parse_link_header(link_header: &str) -> LinkPagination {
    let mut info = LinkPagination::default();

    for part in link_header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.trim().split(';') {
            let segment = segment.trim();
            if segment.starts_with('<') && segment.ends_with('>') {
                url = Some(&segment[1..segment.len() - 1]);
            } else if let Some(rel_value) = segment.strip_prefix("rel=") {
                rel = Some(rel_value.trim_matches('"'));
            }
        }

        match (url, rel) {
            (Some(url), Some("next")) => info.next_url = Some(url.to_string()),
            (Some(url), Some("last")) => info.last_page = extract_page_from_url(url),
            _ => {}
        }
    }

    info
}

/// Extract the `page` query parameter from a URL.
fn extract_page_from_url(url: &str) -> Option<u32> {
    let query = &url[url.find('?')? + 1..];
    query
        .split('&')
        .find_map(|param| param.strip_prefix("page="))
        .and_then(|value| value.parse().ok())
}

/// Turn an absolute next-page URL into a path relative to `base`.
///
/// URLs on other hosts are returned unchanged.
pub fn relative_to(base: &str, url: &str) -> String {
    url.strip_prefix(base.trim_end_matches('/'))
        .map(str::to_string)
        .unwrap_or_else(|| url.to_string())
}

/// Offset of the next page, or `None` once a short page was received.
pub fn next_offset(received: usize, offset: u32, limit: u32) -> Option<u32> {
    if received < limit as usize {
        None
    } else {
        Some(offset + limit)
    }
}

/// Number of pages to walk for a page-numbered listing.
///
/// Prefers the reported `page_count`, then `ceil(count / per_page)`, then 1.
pub fn page_count(reported: Option<u64>, count: Option<u64>, per_page: u32) -> u32 {
    if let Some(pages) = reported {
        return pages.max(1) as u32;
    }
    match count {
        Some(count) if per_page > 0 => count.div_ceil(per_page as u64).max(1) as u32,
        _ => 1,
    }
}

/// Append a query parameter to a path that may already have a query string.
pub fn with_query(path: &str, key: &str, value: impl std::fmt::Display) -> String {
    let sep = if path.contains('?') { '&' } else { '?' };
    format!("{path}{sep}{key}={value}")
}
