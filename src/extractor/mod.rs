//! Structural extraction.
//!
//! Pure selector queries over the page DOM, no script execution. Every block
//! is optional: a missing block yields empty values, never an error.
//!
//! # Module Structure
//!
//! - `labels`: Cyrillic transliteration and camelCase label keys
//! - `fields`: header fields and label/value blocks
//! - `trades`: trade-history table
//! - `distribution`: symbol distribution bars and author signal cards

pub mod distribution;
pub mod fields;
pub mod labels;
pub mod trades;

use std::sync::Arc;

use dom_query::Selection;
use tracing::debug;

pub use labels::{normalize_label, transliterate};

use crate::dom::{self, select_each, try_select};
use crate::error::{Error, Result};
use crate::result::{ChartAvailability, ChartBundle, ParseMeta, SignalRecord};
use crate::selectors::SelectorConfig;

/// Parser name reported in `ParseMeta::parser_used`.
pub const STATIC_PARSER: &str = "static";

/// Reject input that cannot be an HTML document.
pub fn ensure_markup(html: &str) -> Result<()> {
    if html.trim().is_empty() || !html.contains('<') {
        return Err(Error::Parse("document has no markup".to_string()));
    }
    Ok(())
}

/// Selector-driven extractor.
#[derive(Debug, Clone)]
pub struct StaticExtractor {
    selectors: Arc<SelectorConfig>,
    /// First structural selector that does not compile, with the parser error.
    invalid: Option<String>,
}

impl StaticExtractor {
    #[must_use]
    pub fn new(selectors: Arc<SelectorConfig>) -> Self {
        let invalid = selectors
            .extraction_selectors()
            .into_iter()
            .filter(|sel| !sel.trim().is_empty())
            .find_map(|sel| dom::compile(sel).err())
            .map(|e| e.to_string());
        Self { selectors, invalid }
    }

    #[must_use]
    pub fn selectors(&self) -> &SelectorConfig {
        &self.selectors
    }

    /// Extract every structural block from `html`.
    ///
    /// Fails with [`Error::Parse`] when `html` contains no markup and with
    /// [`Error::Extraction`] when a configured structural selector is malformed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use signal_scraper::{SelectorConfig, StaticExtractor};
    ///
    /// let html = r#"<div class="s-signal-header">
    ///     <h1 class="s-signal-header__name">Alpha Signal</h1></div>"#;
    /// let extractor = StaticExtractor::new(Arc::new(SelectorConfig::default()));
    /// let record = extractor.extract(html, "https://www.mql5.com/en/signals/1")?;
    /// assert_eq!(record.info("signalName"), "Alpha Signal");
    /// # Ok::<(), signal_scraper::Error>(())
    /// ```
    pub fn extract(&self, html: &str, url: &str) -> Result<SignalRecord> {
        ensure_markup(html)?;
        if let Some(reason) = &self.invalid {
            return Err(Error::Extraction(reason.clone()));
        }

        let doc = dom::parse(html);
        let root = dom::root(&doc);
        let mut record = self.extract_from(&root);
        record.meta = ParseMeta {
            parser_used: STATIC_PARSER.to_string(),
            url: url.to_string(),
            ..ParseMeta::default()
        };

        debug!(
            url,
            trades = record.trade_history.len(),
            distribution = record.distribution.len(),
            "static extraction"
        );
        Ok(record)
    }

    /// Structural blocks from an already parsed document; charts carry only
    /// the availability summary.
    #[must_use]
    pub fn extract_from(&self, root: &Selection) -> SignalRecord {
        let s = &*self.selectors;

        let mut general_info = fields::extract_general(root, &s.general);
        fields::merge_pairs(root, &s.info_pairs, &mut general_info);

        SignalRecord {
            general_info,
            statistics: fields::extract_pairs(root, &s.statistics),
            trade_history: trades::extract_trades(root, &s.trades),
            distribution: distribution::extract_distribution(root, &s.distribution),
            author_signals: distribution::extract_author_signals(root, &s.author_signals),
            charts: ChartBundle {
                available: self.chart_availability(root),
                ..ChartBundle::default()
            },
            meta: ParseMeta::default(),
        }
    }

    /// Cheap summary of what chart sources the page carries.
    #[must_use]
    pub fn chart_availability(&self, root: &Selection) -> ChartAvailability {
        let s = &*self.selectors;

        let has_chart_container = s
            .chart_containers
            .iter()
            .any(|sel| try_select(root, sel).is_some());
        let has_svg = try_select(root, "svg").is_some();
        let has_chart_scripts = select_each(root, "script").iter().any(|script| {
            let src = dom::attr_or_empty(script, "src").to_ascii_lowercase();
            if src.contains("chart") {
                return true;
            }
            let body = script.text();
            s.chart_variables.iter().any(|name| body.contains(name.as_str()))
                || (!s.chart_namespace.is_empty() && body.contains(s.chart_namespace.as_str()))
        });

        ChartAvailability {
            has_chart_container,
            has_svg,
            has_chart_scripts,
        }
    }
}
