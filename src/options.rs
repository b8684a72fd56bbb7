//! Configuration options for the scraping pipeline.
//!
//! The `Options` struct controls caching, transport limits, rendering timeouts
//! and the default parsing tier. Selector heuristics live in
//! [`SelectorConfig`](crate::SelectorConfig) and the resource policy in
//! [`GatePolicy`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::selectors::SelectorConfig;

/// Parsing tier, selecting which extractor strategy runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Static extraction on the unreduced HTML.
    Fast,
    /// Static extraction on the reduced HTML.
    #[default]
    Normal,
    /// Rendering extraction on the reduced HTML with chart recovery.
    Advanced,
}

impl Tier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Normal => "normal",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "normal" => Ok(Self::Normal),
            "advanced" => Ok(Self::Advanced),
            other => Err(Error::Config(format!("unknown tier: {other}"))),
        }
    }
}

/// HTML reduction strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionMode {
    /// Delete block-listed elements, keep everything else.
    Remove,
    /// Build a fresh document from allow-listed elements only.
    #[default]
    Keep,
}

/// Sub-resource policy consulted by the [`ResourceGate`](crate::ResourceGate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatePolicy {
    /// Stub same-domain scripts/styles that match no allow-list pattern.
    ///
    /// External non-matching scripts/styles are always stubbed.
    ///
    /// Default: `true`
    pub block_unlisted_same_domain: bool,

    /// Let images, fonts and media through.
    ///
    /// Default: `false`
    pub load_images: bool,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            block_unlisted_same_domain: true,
            load_images: false,
        }
    }
}

/// Where cached pages and results are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CacheLocation {
    /// In-process map. Lost on restart.
    #[default]
    Memory,
    /// One JSON file per key under this directory.
    Disk(PathBuf),
}

/// Configuration options for the pipeline.
///
/// All fields are public for easy configuration. Use `Default::default()`
/// for standard settings.
///
/// # Example
///
/// ```rust
/// use signal_scraper::{Options, Tier};
/// use std::time::Duration;
///
/// let options = Options {
///     default_tier: Tier::Advanced,
///     render_timeout: Duration::from_secs(20),
///     ..Options::default()
/// };
/// assert!(options.cache_enabled);
/// ```
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct Options {
    /// Cache fetched HTML.
    ///
    /// Default: `true`
    pub cache_enabled: bool,

    /// Time-to-live for cached pages.
    ///
    /// Default: `3600s`
    pub cache_ttl: Duration,

    /// Time-to-live for cached `SignalRecord`s keyed by URL and tier.
    ///
    /// `None` disables the result cache.
    ///
    /// Default: `None`
    pub result_cache_ttl: Option<Duration>,

    /// Storage backing both caches.
    ///
    /// Default: `CacheLocation::Memory`
    pub cache_location: CacheLocation,

    /// Overall request timeout for the page GET.
    ///
    /// Default: `30s`
    pub fetch_timeout: Duration,

    /// Maximum redirects followed by the transport.
    ///
    /// Default: `5`
    pub max_redirects: usize,

    /// Bound on the wait for the rendered document's load event.
    ///
    /// Default: `10s`
    pub render_timeout: Duration,

    /// Extra delay after load so deferred chart scripts can populate globals.
    ///
    /// Default: `2s`
    pub settle_delay: Duration,

    /// Tier used when a request does not name one.
    ///
    /// Default: `Tier::Normal`
    pub default_tier: Tier,

    /// Reduction strategy for the normal and advanced tiers.
    ///
    /// Default: `ReductionMode::Keep`
    pub reduction_mode: ReductionMode,

    /// Retry keep-mode failures in remove-mode.
    ///
    /// Default: `true`
    pub reduction_fallback: bool,

    /// Chromium binary for the rendering backend; auto-detected when `None`.
    ///
    /// Default: `None`
    pub chrome_executable: Option<PathBuf>,

    /// Sub-resource policy during rendering.
    pub gate: GatePolicy,

    /// Selector heuristics.
    pub selectors: SelectorConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl: Duration::from_secs(3600),
            result_cache_ttl: None,
            cache_location: CacheLocation::Memory,
            fetch_timeout: Duration::from_secs(30),
            max_redirects: 5,
            render_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_secs(2),
            default_tier: Tier::Normal,
            reduction_mode: ReductionMode::Keep,
            reduction_fallback: true,
            chrome_executable: None,
            gate: GatePolicy::default(),
            selectors: SelectorConfig::default(),
        }
    }
}

impl Options {
    #[must_use]
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.default_tier = tier;
        self
    }

    #[must_use]
    pub fn with_selectors(mut self, selectors: SelectorConfig) -> Self {
        self.selectors = selectors;
        self
    }

    #[must_use]
    pub fn with_cache_location(mut self, location: CacheLocation) -> Self {
        self.cache_location = location;
        self
    }

    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.cache_enabled = false;
        self.result_cache_ttl = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = Options::default();

        assert!(opts.cache_enabled);
        assert_eq!(opts.cache_ttl, Duration::from_secs(3600));
        assert!(opts.result_cache_ttl.is_none());
        assert_eq!(opts.cache_location, CacheLocation::Memory);
        assert_eq!(opts.fetch_timeout, Duration::from_secs(30));
        assert_eq!(opts.max_redirects, 5);
        assert_eq!(opts.render_timeout, Duration::from_secs(10));
        assert_eq!(opts.settle_delay, Duration::from_secs(2));
        assert_eq!(opts.default_tier, Tier::Normal);
        assert_eq!(opts.reduction_mode, ReductionMode::Keep);
        assert!(opts.reduction_fallback);
        assert!(opts.gate.block_unlisted_same_domain);
        assert!(!opts.gate.load_images);
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!("fast".parse::<Tier>().unwrap(), Tier::Fast);
        assert_eq!(" Advanced ".parse::<Tier>().unwrap(), Tier::Advanced);
        assert!("turbo".parse::<Tier>().is_err());
        assert_eq!(Tier::Normal.to_string(), "normal");
    }

    #[test]
    fn test_without_cache_disables_both_caches() {
        let opts = Options {
            result_cache_ttl: Some(Duration::from_secs(60)),
            ..Options::default()
        }
        .without_cache();

        assert!(!opts.cache_enabled);
        assert!(opts.result_cache_ttl.is_none());
    }
}
