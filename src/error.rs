//! Error types for signal-scraper.
//!
//! This module defines the error types returned by the fetch, reduction,
//! rendering and extraction stages.

use std::time::Duration;

/// Error type for pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// URL does not match `https://www.mql5.com/<locale>/signals/<id>`.
    #[error("Invalid signal URL: {0}")]
    InvalidUrl(String),

    /// Network/transport failure, non-2xx status or empty body.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// HTML reduction failed.
    ///
    /// Never returned by `HtmlReducer::process`, which degrades to remove-mode
    /// and then to the original HTML.
    #[error("HTML reduction failed: {0}")]
    Reduction(String),

    /// Rendering backend did not reach the load event in time.
    #[error("Render timed out after {}ms", .0.as_millis())]
    RenderTimeout(Duration),

    /// Rendering backend could not be started (browser launch, page creation).
    #[error("Render backend unavailable: {0}")]
    RenderUnavailable(String),

    /// Rendering backend failed after the page was loading.
    #[error("Render failed: {0}")]
    Render(String),

    /// Input could not be treated as HTML markup at all.
    #[error("HTML parsing failed: {0}")]
    Parse(String),

    /// General structural extraction failure.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Cache storage failure (disk backend only).
    #[error("Cache error: {0}")]
    Cache(String),

    /// Invalid configuration (selector file, pattern).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error aborts a rendering attempt because of the wait timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RenderTimeout(_))
    }

    /// Whether a rendering attempt produced nothing usable, so the result must
    /// come from another strategy instead of degrading to empty charts.
    #[must_use]
    pub fn aborts_render(&self) -> bool {
        matches!(self, Self::RenderTimeout(_) | Self::RenderUnavailable(_))
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
