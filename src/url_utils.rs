//! URL Utility Functions
//!
//! Signal-page URL validation, cache-key normalization and relative link
//! resolution against the site origin.

use url::Url;

use crate::error::{Error, Result};
use crate::patterns::SIGNAL_URL;

/// The only host the pipeline fetches from.
pub const SITE_HOST: &str = "www.mql5.com";

/// Origin used to resolve relative links found on signal pages.
pub const SITE_ORIGIN: &str = "https://www.mql5.com";

/// A validated signal page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalUrl {
    pub url: Url,
    /// Two-letter locale segment (`en`, `ru`, ...).
    pub locale: String,
    /// Numeric signal id.
    pub id: u64,
}

/// Validate `https://www.mql5.com/<2 lowercase letters>/signals/<digits>`.
///
/// The string must have that exact shape as written: no query, fragment,
/// port, user-info, dot segments, upper case or embedded whitespace.
///
/// # Example
///
/// ```rust
/// use signal_scraper::url_utils::validate_signal_url;
///
/// let parsed = validate_signal_url("https://www.mql5.com/en/signals/123456")?;
/// assert_eq!(parsed.id, 123456);
/// assert!(validate_signal_url("http://www.mql5.com/en/signals/1").is_err());
/// # Ok::<(), signal_scraper::Error>(())
/// ```
pub fn validate_signal_url(raw: &str) -> Result<SignalUrl> {
    let invalid = || Error::InvalidUrl(raw.to_string());

    // Checked before parsing: `Url::parse` normalizes case, default ports,
    // dot segments and stray tabs away.
    let caps = SIGNAL_URL.captures(raw).ok_or_else(invalid)?;
    let locale = caps[1].to_string();
    let id = caps[2].parse::<u64>().map_err(|_| invalid())?;

    let url = Url::parse(raw).map_err(|_| invalid())?;

    if url.scheme() != "https"
        || url.host_str() != Some(SITE_HOST)
        || url.port().is_some()
        || !url.username().is_empty()
        || url.password().is_some()
        || url.query().is_some()
        || url.fragment().is_some()
    {
        return Err(invalid());
    }

    Ok(SignalUrl { url, locale, id })
}

/// Normalized form used in result-cache keys: lowercase host, no trailing slash.
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);
            let path = url.path().trim_end_matches('/').to_string();
            url.set_path(if path.is_empty() { "/" } else { &path });
            url.to_string().trim_end_matches('/').to_string()
        }
        Err(_) => raw.trim().trim_end_matches('/').to_string(),
    }
}

/// Check if a string is a valid absolute http(s) URL.
///
/// # Returns
/// * `(is_absolute, parsed_url)` - Whether URL is absolute and the parsed URL if valid
#[must_use]
pub fn is_absolute_url(s: &str) -> (bool, Option<Url>) {
    let s = s.trim();

    if !s.starts_with("http://") && !s.starts_with("https://") {
        return (false, None);
    }

    match Url::parse(s) {
        Ok(url) if url.host().is_some() => (true, Some(url)),
        _ => (false, None),
    }
}

/// Convert a relative or absolute URL to absolute form.
///
/// Special schemes (`javascript:`, `mailto:`, ...) and unresolvable inputs are
/// returned unchanged.
#[must_use]
pub fn create_absolute_url(url_str: &str, base: &Url) -> String {
    let url_str = url_str.trim();

    if url_str.is_empty() {
        return String::new();
    }

    if url_str.starts_with("data:")
        || url_str.starts_with("javascript:")
        || url_str.starts_with("mailto:")
        || url_str.starts_with("tel:")
    {
        return url_str.to_string();
    }

    let (is_abs, _) = is_absolute_url(url_str);
    if is_abs {
        return url_str.to_string();
    }

    match base.join(url_str) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => url_str.to_string(),
    }
}

/// Resolve a link found on a signal page against [`SITE_ORIGIN`].
#[must_use]
pub fn resolve_site_link(href: &str) -> String {
    match Url::parse(SITE_ORIGIN) {
        Ok(base) => create_absolute_url(href, &base),
        Err(_) => href.trim().to_string(),
    }
}

/// Host of an absolute URL, or empty string.
#[must_use]
pub fn host_of(url_str: &str) -> String {
    let (is_abs, parsed) = is_absolute_url(url_str);
    if !is_abs {
        return String::new();
    }
    parsed
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default()
}

/// Whether `url_str` lives on the signal site (or one of its subdomains).
#[must_use]
pub fn is_same_site(url_str: &str) -> bool {
    let host = host_of(url_str);
    if host.is_empty() {
        // Relative URLs resolve against the page itself.
        return !url_str.trim().starts_with("//");
    }
    let site = SITE_HOST.trim_start_matches("www.");
    host == site || host.ends_with(&format!(".{site}"))
}
