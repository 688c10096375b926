//! Link extraction from listing bodies.

use scraper::{Html, Selector};

/// Collect child targets from a listing body, in document order.
///
/// Targets are anchor hrefs with the listing filter applied:
/// - empty targets and query-only targets (`?C=N;O=D` sort links) are
///   dropped;
/// - targets starting with the literal bytes `http` are dropped. This also
///   drops absolute links back to the fetched origin; long-standing
///   behavior, kept as is. Protocol-relative `//host` targets are dropped
///   with them;
/// - any `#fragment` is cut, then trailing `/` stripped; targets that end
///   up empty are dropped.
///
/// Order is preserved and duplicates survive.
pub fn extract_refs(body: &str) -> Vec<String> {
    let selector = match Selector::parse("a") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let document = Html::parse_document(body);

    let mut refs = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if let Some(target) = normalize(href) {
            refs.push(target);
        }
    }
    refs
}

fn normalize(href: &str) -> Option<String> {
    if href.is_empty()
        || href.starts_with('?')
        || href.starts_with("http")
        || href.starts_with("//")
    {
        return None;
    }
    let target = match href.split_once('#') {
        Some((head, _)) => head,
        None => href,
    };
    let target = target.trim_end_matches('/');
    if target.is_empty() {
        return None;
    }
    Some(target.to_string())
}
