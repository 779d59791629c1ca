//! Playlist rewriting.
//!
//! Every media reference in a playlist is replaced by a same-origin proxy
//! URL of the form `<proxy_path>?url=<percent-encoded absolute URL>`:
//!
//! - URI lines (anything that is not blank and not a `#` tag) are replaced
//!   as a whole; surrounding whitespace is kept.
//! - Tag lines carrying `URI="..."` attributes (`#EXT-X-MAP`,
//!   `#EXT-X-MEDIA`, `#EXT-X-KEY`, `#EXT-X-I-FRAME-STREAM-INF`, ...) have
//!   only the quoted value replaced.
//! - Everything else, including line separators, is copied byte for byte.
//!
//! Relative references are resolved against the playlist's own URL. If that
//! URL cannot be parsed, or the body is not UTF-8, the playlist is returned
//! untouched: the original references are still fetchable directly, a
//! half-rewritten playlist is not.

use std::borrow::Cow;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Characters escaped in the `url` query value: everything except the
/// RFC 3986 unreserved set.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const URI_ATTRIBUTE: &str = "URI=\"";

/// Rewrite all references in `body` so they are fetched through `proxy_path`.
pub fn rewrite_manifest<'a>(body: &'a [u8], source_url: &str, proxy_path: &str) -> Cow<'a, [u8]> {
    let Ok(base) = Url::parse(source_url) else {
        return Cow::Borrowed(body);
    };
    let Ok(text) = std::str::from_utf8(body) else {
        return Cow::Borrowed(body);
    };

    let mut out = String::with_capacity(text.len() * 2);
    for raw_line in text.split_inclusive('\n') {
        let (line, ending) = split_line_ending(raw_line);
        rewrite_line(line, &base, proxy_path, &mut out);
        out.push_str(ending);
    }

    Cow::Owned(out.into_bytes())
}

/// Resolve a playlist reference to an absolute http(s) URL.
///
/// Absolute `http://` and `https://` references are returned verbatim.
/// Returns `None` when the reference cannot be resolved or resolves to a
/// scheme the proxy would refuse (`data:`, `skd:`, ...).
pub fn resolve_reference(reference: &str, base: &Url) -> Option<String> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Some(reference.to_string());
    }
    let resolved = base.join(reference).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.into())
}

/// Build the proxy URL for an absolute upstream URL.
pub fn proxy_url(absolute: &str, proxy_path: &str) -> String {
    format!(
        "{proxy_path}?url={}",
        utf8_percent_encode(absolute, QUERY_VALUE)
    )
}

fn split_line_ending(raw: &str) -> (&str, &str) {
    if let Some(line) = raw.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = raw.strip_suffix('\n') {
        (line, "\n")
    } else {
        (raw, "")
    }
}

fn rewrite_line(line: &str, base: &Url, proxy_path: &str, out: &mut String) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        out.push_str(line);
        return;
    }
    if trimmed.starts_with('#') {
        rewrite_uri_attributes(line, base, proxy_path, out);
        return;
    }

    let start = line.len() - line.trim_start().len();
    let end = start + trimmed.len();
    out.push_str(&line[..start]);
    match resolve_reference(trimmed, base) {
        Some(absolute) => out.push_str(&proxy_url(&absolute, proxy_path)),
        None => out.push_str(trimmed),
    }
    out.push_str(&line[end..]);
}

fn rewrite_uri_attributes(line: &str, base: &Url, proxy_path: &str, out: &mut String) {
    let mut rest = line;
    while let Some(idx) = rest.find(URI_ATTRIBUTE) {
        let value_start = idx + URI_ATTRIBUTE.len();
        let Some(value_len) = rest[value_start..].find('"') else {
            break;
        };
        // Only a real attribute name: `URI` directly after `:` or `,`.
        let is_attribute = idx > 0 && matches!(rest.as_bytes()[idx - 1], b':' | b',');
        let value = &rest[value_start..value_start + value_len];

        out.push_str(&rest[..value_start]);
        let absolute = if is_attribute && !value.trim().is_empty() {
            resolve_reference(value, base)
        } else {
            None
        };
        match absolute {
            Some(absolute) => out.push_str(&proxy_url(&absolute, proxy_path)),
            None => out.push_str(value),
        }
        rest = &rest[value_start + value_len..];
    }
    out.push_str(rest);
}
