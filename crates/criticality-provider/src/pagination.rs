use std::collections::HashMap;

use reqwest::Url;
use reqwest::header::HeaderMap;

/// Parses an RFC 8288 `Link` header into `rel -> url`.
pub fn parse_link_header(value: &str) -> HashMap<String, String> {
    let mut links = HashMap::new();
    for part in value.split(',') {
        let mut segments = part.split(';');
        let Some(target) = segments.next().map(str::trim) else {
            continue;
        };
        let Some(url) = target.strip_prefix('<').and_then(|t| t.strip_suffix('>')) else {
            continue;
        };
        for param in segments {
            if let Some(rel) = param.trim().strip_prefix("rel=") {
                links.insert(rel.trim_matches('"').to_string(), url.to_string());
            }
        }
    }
    links
}

fn page_param(url: &str) -> Option<u64> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.parse().ok())
}

pub fn link(headers: &HeaderMap, rel: &str) -> Option<String> {
    let raw = headers.get("link")?.to_str().ok()?;
    parse_link_header(raw).remove(rel)
}

/// With `per_page=1` the `last` page number equals the total record count.
pub fn last_page(headers: &HeaderMap) -> Option<u64> {
    link(headers, "last").and_then(|u| page_param(&u))
}

fn numeric_header(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// GitLab reports totals in `X-Total`, but drops it past 10k records.
pub fn total_header(headers: &HeaderMap) -> Option<u64> {
    numeric_header(headers, "x-total")
}

/// Page count; absent under the same conditions as `X-Total`.
pub fn total_pages_header(headers: &HeaderMap) -> Option<u64> {
    numeric_header(headers, "x-total-pages")
}

pub fn next_page_header(headers: &HeaderMap) -> Option<u64> {
    numeric_header(headers, "x-next-page")
}
