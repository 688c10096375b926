//! Content classification: directory listings and HTML sniffing.

use std::path::Path;

use mime::Mime;

/// Content type Apache-style servers declare for generated listings.
pub const DIRECTORY_TYPE: &str = "httpd/unix-directory";

/// File name a listing is cached under once its path is rewritten.
pub const INDEX_FILE: &str = "index.html";

const DOCTYPE_MARKER: &[u8] = b"<!DOCTYPE HTML";

/// Whether a declared content type classifies the body as a listing.
///
/// Only the essence counts: parameters are stripped and case is ignored,
/// so `Text/HTML; charset=utf-8` is a listing.
pub fn is_listing(declared: &str) -> bool {
    match declared.parse::<Mime>() {
        Ok(m) => {
            let essence = m.essence_str();
            essence.eq_ignore_ascii_case(mime::TEXT_HTML.essence_str())
                || essence.eq_ignore_ascii_case(DIRECTORY_TYPE)
        }
        Err(_) => false,
    }
}

/// Whether a text body looks like an HTML document.
///
/// Generated listings start with a doctype; the check is a literal
/// case-insensitive prefix match, not a parse.
pub fn looks_like_html(text: &str) -> bool {
    text.as_bytes()
        .get(..DOCTYPE_MARKER.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(DOCTYPE_MARKER))
}

/// Whether a cached name already points at an HTML document, in which case
/// the listing rewrite leaves it alone.
pub fn has_html_suffix(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("html") | Some("htm")
    )
}
