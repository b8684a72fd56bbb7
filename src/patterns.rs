//! Compiled regex patterns and configurable text patterns.
//!
//! Static patterns are compiled once using `LazyLock`. `TextPattern` wraps the
//! user-supplied "substring or `/regex/`" entries from `SelectorConfig`.

#![allow(clippy::expect_used)]

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

// =============================================================================
// Page Structure Patterns
// =============================================================================

/// Whole signal page URL as written: `https://www.mql5.com/<2-letter locale>/signals/<digits>`
/// with optional trailing slash.
pub static SIGNAL_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://www\.mql5\.com/([a-z]{2})/signals/([0-9]+)/?$").expect("SIGNAL_URL regex")
});

/// Percentage in an inline bar style, e.g. `width: 37.5%`.
pub static WIDTH_PERCENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)width\s*:\s*(-?\d+(?:\.\d+)?)\s*%").expect("WIDTH_PERCENT regex")
});

/// HTML comments, including multi-line ones.
pub static HTML_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->").expect("HTML_COMMENT regex")
});

/// Runs of whitespace collapsed to a single space in extracted text.
pub static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+").expect("WHITESPACE_RUN regex")
});

// =============================================================================
// SVG Path Patterns
// =============================================================================

/// One token of SVG path data: a command letter or a number.
///
/// Numbers cover signs, leading dots and exponents (`-1.5e-3`, `.5`).
pub static PATH_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[MmLlHhVvCcSsQqTtAaZz]|[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?")
        .expect("PATH_TOKEN regex")
});

// =============================================================================
// Inline Script Patterns
// =============================================================================

/// Named function declaration in script text; group 1 is the name.
pub static JS_FUNCTION_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bfunction\s+([A-Za-z_$][\w$]*)\s*\(").expect("JS_FUNCTION_DECL regex")
});

/// `<base ...>` element already present in a document.
pub static BASE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<base\s").expect("BASE_TAG regex")
});

/// Opening `<head>` tag, for injecting a `<base>` element.
pub static HEAD_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<head(\s[^>]*)?>").expect("HEAD_OPEN regex")
});

// =============================================================================
// Configurable Patterns
// =============================================================================

/// A configured match rule: plain substring, or a regex written as `/.../`.
#[derive(Debug, Clone)]
pub enum TextPattern {
    Contains(String),
    Regex(Regex),
}

impl TextPattern {
    /// Parse a config entry. `/abc/` becomes a regex, anything else a substring.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() >= 2 && raw.starts_with('/') && raw.ends_with('/') {
            let body = &raw[1..raw.len() - 1];
            Regex::new(body)
                .map(Self::Regex)
                .map_err(|e| Error::Config(format!("invalid pattern {raw}: {e}")))
        } else {
            Ok(Self::Contains(raw.to_string()))
        }
    }

    #[must_use]
    pub fn is_match(&self, haystack: &str) -> bool {
        match self {
            Self::Contains(needle) => haystack.contains(needle.as_str()),
            Self::Regex(re) => re.is_match(haystack),
        }
    }
}

/// Compile a list of config entries, failing on the first invalid regex.
pub fn compile_all(raw: &[String]) -> Result<Vec<TextPattern>> {
    raw.iter().map(|r| TextPattern::parse(r)).collect()
}

/// True when any pattern matches.
#[must_use]
pub fn any_match(patterns: &[TextPattern], haystack: &str) -> bool {
    patterns.iter().any(|p| p.is_match(haystack))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_url_accepts_locale_and_id() {
        assert!(SIGNAL_URL.is_match("https://www.mql5.com/en/signals/123456"));
        assert!(SIGNAL_URL.is_match("https://www.mql5.com/ru/signals/1/"));
        assert!(!SIGNAL_URL.is_match("https://www.mql5.com/EN/signals/1"));
        assert!(!SIGNAL_URL.is_match("https://www.mql5.com/eng/signals/1"));
        assert!(!SIGNAL_URL.is_match("https://www.mql5.com/en/signals/abc"));
        assert!(!SIGNAL_URL.is_match("https://www.mql5.com/en/signals/1/history"));
        assert!(!SIGNAL_URL.is_match("https://www.mql5.com/en/signals/1\n"));
        assert!(!SIGNAL_URL.is_match("https://wwwxmql5.com/en/signals/1"));
    }

    #[test]
    fn width_percent_extracts_decimal() {
        let caps = WIDTH_PERCENT.captures("background: red; width: 37.5%;").unwrap();
        assert_eq!(&caps[1], "37.5");
        let caps = WIDTH_PERCENT.captures("WIDTH:60%").unwrap();
        assert_eq!(&caps[1], "60");
    }

    #[test]
    fn text_pattern_substring_and_regex() {
        let plain = TextPattern::parse("jquery").unwrap();
        assert!(plain.is_match("https://cdn.example.com/jquery.min.js"));

        let re = TextPattern::parse(r"/\/(all|main)\.css/").unwrap();
        assert!(re.is_match("https://c.mql5.com/css/all.css"));
        assert!(!re.is_match("https://c.mql5.com/css/print.css"));
    }

    #[test]
    fn invalid_regex_pattern_is_config_error() {
        assert!(matches!(TextPattern::parse("/(unclosed/"), Err(Error::Config(_))));
    }

    #[test]
    fn path_tokens_split_packed_numbers() {
        let tokens: Vec<&str> = PATH_TOKEN.find_iter("M10-5L.5.5").map(|m| m.as_str()).collect();
        assert_eq!(tokens, vec!["M", "10", "-5", "L", ".5", ".5"]);
    }
}
