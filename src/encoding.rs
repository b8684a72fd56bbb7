//! Response body decoding.
//!
//! The fetcher receives raw bytes. The charset is taken from the HTTP
//! `Content-Type` header when present, then from the document's own
//! `<meta charset>` / `http-equiv` declaration, and defaults to UTF-8.

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use std::sync::LazyLock;

/// `<meta charset="...">`
#[allow(clippy::expect_used)]
static CHARSET_META_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([^"'\s>;]+)"#).expect("valid regex")
});

/// `charset=...` parameter inside a Content-Type value.
#[allow(clippy::expect_used)]
static CHARSET_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;]+)"#).expect("valid regex")
});

/// Charset label from a `Content-Type` header value.
#[must_use]
pub fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    CHARSET_PARAM_RE
        .captures(content_type)
        .and_then(|c| c.get(1))
        .and_then(|m| Encoding::for_label(m.as_str().as_bytes()))
}

/// Charset declared in the first 1024 bytes of the document.
///
/// Covers both `<meta charset>` and `<meta http-equiv="Content-Type">`.
#[must_use]
pub fn sniff_meta_charset(html: &[u8]) -> Option<&'static Encoding> {
    let head = &html[..html.len().min(1024)];
    let head_str = String::from_utf8_lossy(head);
    CHARSET_META_RE
        .captures(&head_str)
        .and_then(|c| c.get(1))
        .and_then(|m| Encoding::for_label(m.as_str().as_bytes()))
}

/// Decode a response body to UTF-8.
///
/// Invalid sequences become U+FFFD rather than failing the fetch.
#[must_use]
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> (String, &'static Encoding) {
    let encoding = content_type
        .and_then(charset_from_content_type)
        .or_else(|| sniff_meta_charset(bytes))
        .unwrap_or(UTF_8);

    if encoding == UTF_8 {
        return (String::from_utf8_lossy(bytes).into_owned(), UTF_8);
    }

    let (decoded, used, _had_errors) = encoding.decode(bytes);
    (decoded.into_owned(), used)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_charset_wins_over_meta() {
        let html = b"<html><head><meta charset=\"utf-8\"></head><body>Caf\xE9</body></html>";
        let (text, enc) = decode_body(html, Some("text/html; charset=ISO-8859-1"));
        // encoding_rs maps ISO-8859-1 to windows-1252 per WHATWG
        assert_eq!(enc.name(), "windows-1252");
        assert!(text.contains("Café"));
    }

    #[test]
    fn meta_charset_used_without_header() {
        let html = b"<html><head><meta charset=\"windows-1251\"></head><body>\xD0\xEE\xF1\xF2</body></html>";
        let (text, enc) = decode_body(html, Some("text/html"));
        assert_eq!(enc.name(), "windows-1251");
        assert!(text.contains("Рост"));
    }

    #[test]
    fn http_equiv_declaration_is_sniffed() {
        let html = br#"<meta http-equiv="Content-Type" content="text/html; charset=ISO-8859-1">"#;
        assert_eq!(sniff_meta_charset(html).map(Encoding::name), Some("windows-1252"));
    }

    #[test]
    fn defaults_to_utf8_and_tolerates_garbage() {
        let (text, enc) = decode_body(b"<p>Test \xFF\xFE ok</p>", None);
        assert_eq!(enc, UTF_8);
        assert!(text.contains("Test"));
        assert!(text.contains("ok"));
    }

    #[test]
    fn unknown_header_label_falls_through() {
        assert!(charset_from_content_type("text/html; charset=klingon").is_none());
        assert!(charset_from_content_type("text/html").is_none());
    }
}
