//! # signal-scraper
//!
//! Scraper for trading-signal pages on `www.mql5.com`.
//!
//! A signal page is fetched (with a TTL cache in front of the network), shrunk
//! to the handful of blocks that carry data, and turned into a normalized
//! [`SignalRecord`]: header fields, statistics, trade history, symbol
//! distribution, the author's other signals and, in the advanced tier, chart
//! series recovered from script globals and rendered SVG.
//!
//! ## Quick Start
//!
//! ```rust
//! use signal_scraper::extract;
//!
//! let html = r#"<html><body>
//!   <div class="s-signal-header">
//!     <h1 class="s-signal-header__name">Alpha Signal</h1>
//!     <div class="s-signal-header__author"><a href="/en/users/trader1">trader1</a></div>
//!   </div>
//! </body></html>"#;
//!
//! let record = extract(html, "https://www.mql5.com/en/signals/123")?;
//! assert_eq!(record.info("signalName"), "Alpha Signal");
//! assert_eq!(record.info("author"), "trader1");
//! # Ok::<(), signal_scraper::Error>(())
//! ```
//!
//! Network scraping goes through [`Scraper`]:
//!
//! ```rust,no_run
//! use signal_scraper::{Options, RequestOptions, Scraper, Tier};
//!
//! # async fn run() -> signal_scraper::Result<()> {
//! let scraper = Scraper::new(Options::default())?;
//! let record = scraper
//!     .get_signal_data("https://www.mql5.com/en/signals/123", &RequestOptions::tier(Tier::Advanced))
//!     .await?;
//! println!("{}", serde_json::to_string_pretty(&record).unwrap_or_default());
//! # Ok(())
//! # }
//! ```
//!
//! ## Tiers
//!
//! - **fast**: selector extraction on the page as fetched
//! - **normal**: selector extraction on the reduced page
//! - **advanced**: rendering plus chart recovery, with static fallback
//!
//! ## Features
//!
//! - `chrome` (default): headless Chromium rendering backend via `chromiumoxide`

mod error;
mod options;
mod patterns;
mod result;
mod selectors;

/// DOM helpers over `dom_query` with pre-compiled selectors.
pub mod dom;

/// Logging setup for binaries.
pub mod logging;

/// TTL key/value cache, in memory or on disk.
pub mod cache;

/// URL validation, normalization and link resolution.
pub mod url_utils;

/// Character encoding detection and transcoding.
pub mod encoding;

/// Page fetching through a transport and the page cache.
pub mod fetcher;

/// HTML reduction (keep / remove strategies).
pub mod reducer;

/// Sub-resource allow / stub / block policy.
pub mod gate;

/// Selector-driven structural extraction.
pub mod extractor;

/// Rendering backends and chart recovery.
pub mod render;

/// Tier dispatch, fallback, metadata and events.
pub mod scraper;

// Public API - re-exports
pub use error::{Error, Result};
pub use extractor::StaticExtractor;
pub use fetcher::{FetchOptions, FetchStats, FetchedPage, HttpTransport, PageFetcher, Transport};
pub use gate::{GateDecision, GateStats, ResourceGate};
pub use options::{CacheLocation, GatePolicy, Options, ReductionMode, Tier};
pub use reducer::{HtmlReducer, Reduction, Strategy};
pub use render::{RenderBackend, RenderSettings, RenderedPage, RenderingExtractor, StaticBackend};
#[cfg(feature = "chrome")]
pub use render::ChromeBackend;
pub use result::{
    AuthorSignal, ChartAvailability, ChartBundle, DistributionItem, JsCharts, ParseMeta, PathPoint,
    RawSeries, SignalRecord, SvgChart, SvgCircle, SvgElements, SvgPath, SvgRect, SvgText, Trade,
    GENERAL_INFO_KEYS,
};
pub use scraper::{LoggingObserver, ParseFailed, ParseObserver, RequestOptions, Scraper, SignalParsed};
pub use selectors::{
    CardSelectors, DistributionSelectors, GeneralSelectors, PairSelectors, ScriptPatterns,
    SelectorConfig, TableSelectors,
};

/// Reduce and extract a page already in hand, with default options.
///
/// Runs the normal tier without network access or caching.
///
/// # Example
///
/// ```rust
/// use signal_scraper::extract;
///
/// let record = extract("<html><body></body></html>", "https://www.mql5.com/en/signals/1")?;
/// assert_eq!(record.info("signalName"), "");
/// assert!(record.trade_history.is_empty());
/// # Ok::<(), signal_scraper::Error>(())
/// ```
pub fn extract(html: &str, url: &str) -> Result<SignalRecord> {
    extract_with_options(html, url, &Options::default())
}

/// [`extract`] with custom options (selectors, reduction mode, fallback).
pub fn extract_with_options(html: &str, url: &str, options: &Options) -> Result<SignalRecord> {
    let started = std::time::Instant::now();
    extractor::ensure_markup(html)?;
    let reducer = HtmlReducer::from_options(options)?;
    let reduced = reducer.process(html, options.reduction_mode);

    let extractor = StaticExtractor::new(std::sync::Arc::new(options.selectors.clone()));
    let mut record = extractor.extract(&reduced.html, url)?;

    record.meta.tier = Tier::Normal;
    record.meta.original_size_bytes = reduced.original_size;
    record.meta.processed_size_bytes = reduced.reduced_size();
    record.meta.reduction = reduced.strategy.to_string();
    record.meta.processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    Ok(record)
}

/// [`extract`] on raw bytes; the charset comes from `<meta charset>`, else UTF-8.
///
/// # Example
///
/// ```rust
/// use signal_scraper::extract_bytes;
///
/// let (encoded, _, _) = encoding_rs::WINDOWS_1251.encode(
///     r#"<html><head><meta charset="windows-1251"></head><body>
///        <h1 class="s-signal-header__name">Рост</h1></body></html>"#,
/// );
/// let record = extract_bytes(&encoded, "https://www.mql5.com/ru/signals/1")?;
/// assert_eq!(record.info("signalName"), "Рост");
/// # Ok::<(), signal_scraper::Error>(())
/// ```
pub fn extract_bytes(html: &[u8], url: &str) -> Result<SignalRecord> {
    let (decoded, _) = encoding::decode_body(html, None);
    extract(&decoded, url)
}
