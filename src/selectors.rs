//! Selector and heuristic configuration.
//!
//! Every CSS selector, script pattern and chart-variable name used by the
//! pipeline lives here as data. The defaults target the signal page layout;
//! a JSON file with the same shape can replace any category:
//!
//! ```rust
//! use signal_scraper::SelectorConfig;
//!
//! let config: SelectorConfig = serde_json::from_str(r#"{
//!     "chartVariables": ["balanceData", "myChart"]
//! }"#)?;
//! assert_eq!(config.chart_variables.len(), 2);
//! assert!(!config.keep.is_empty());
//! # Ok::<(), serde_json::Error>(())
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// All selector heuristics, grouped by pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectorConfig {
    /// Elements copied into the minimal document in keep-mode.
    pub keep: Vec<String>,

    /// Elements deleted in remove-mode.
    pub remove: Vec<String>,

    /// Script classification and allow-list used by reduction and gating.
    pub scripts: ScriptPatterns,

    /// Stylesheet URL patterns allowed during reduction and rendering.
    pub allowed_styles: Vec<String>,

    /// Named general-info fields.
    pub general: GeneralSelectors,

    /// Repeating label/value pattern merged into general info.
    pub info_pairs: PairSelectors,

    /// Repeating label/value pattern for the statistics block.
    pub statistics: PairSelectors,

    /// Trade-history table.
    pub trades: TableSelectors,

    /// Symbol distribution rows.
    pub distribution: DistributionSelectors,

    /// "Other signals by this author" cards.
    pub author_signals: CardSelectors,

    /// Containers whose presence marks chart availability in static tiers.
    pub chart_containers: Vec<String>,

    /// Global variable names inspected by the JS chart pass.
    pub chart_variables: Vec<String>,

    /// Namespaced global object walked recursively by the JS chart pass.
    pub chart_namespace: String,

    /// Substrings marking an `<svg>` (or its parent) as a chart.
    pub svg_chart_markers: Vec<String>,
}

/// Script patterns. Each entry is a plain substring or a `/regex/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptPatterns {
    /// External scripts kept by reduction and allowed by the resource gate.
    pub allowed: Vec<String>,

    /// Tier 1: global bootstrap initialization.
    pub bootstrap: Vec<String>,

    /// Tier 2: analytics initialization.
    pub analytics: Vec<String>,

    /// Tier 3: core/vendor libraries.
    pub core: Vec<String>,
}

/// Selector lists for the fixed general-info fields; first non-empty match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralSelectors {
    pub signal_name: Vec<String>,
    pub author: Vec<String>,
    pub reliability: Vec<String>,
    pub price: Vec<String>,
    pub subscribers: Vec<String>,
    pub growth: Vec<String>,
    pub max_drawdown: Vec<String>,
    pub age: Vec<String>,
    pub description: Vec<String>,
}

/// A repeating item with a label and a value child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PairSelectors {
    pub item: String,
    pub label: String,
    pub value: String,
}

/// Table with a header row and data rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableSelectors {
    pub table: String,
    pub row: String,
    pub header_cell: String,
    pub cell: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DistributionSelectors {
    pub row: String,
    pub symbol: String,
    pub value: String,
    pub bar: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CardSelectors {
    pub card: String,
    pub name: String,
    pub link: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            keep: strings(&[
                ".s-signal-header",
                ".s-list-info",
                ".s-data-columns",
                ".signal-trading-history",
                ".signals-chart-dist",
                ".signal-chart",
                "#signal_growth_chart",
                "#signal_balance_chart",
                ".s-signal-description",
                ".s-other-signals",
            ]),
            remove: strings(&[
                "header",
                "nav",
                "footer",
                "iframe",
                "noscript",
                ".advertising",
                ".banner",
                "[class*='cookie']",
                ".b-social-share",
                ".footer-menu",
                ".login-popup",
                "script[src*='googletagmanager']",
                "script[src*='mc.yandex']",
                "script[src*='facebook']",
                "img",
                "link[rel='preload']",
                "link[rel='prefetch']",
            ]),
            scripts: ScriptPatterns::default(),
            allowed_styles: strings(&["core.css", "signals", "/\\/(all|main)\\.css/"]),
            general: GeneralSelectors::default(),
            info_pairs: PairSelectors {
                item: ".s-list-info__item".to_string(),
                label: ".s-list-info__label".to_string(),
                value: ".s-list-info__value".to_string(),
            },
            statistics: PairSelectors {
                item: ".s-data-columns__item".to_string(),
                label: ".s-data-columns__label".to_string(),
                value: ".s-data-columns__value".to_string(),
            },
            trades: TableSelectors::default(),
            distribution: DistributionSelectors::default(),
            author_signals: CardSelectors::default(),
            chart_containers: strings(&[
                ".signal-chart",
                "#signal_growth_chart",
                "#signal_balance_chart",
                "svg.highcharts-root",
            ]),
            chart_variables: strings(&[
                "balanceData",
                "growthData",
                "equityData",
                "returnData",
                "chartData",
                "balanceChartData",
                "growthChartData",
                "equityChartData",
                "accountData",
                "resourcesData",
            ]),
            chart_namespace: "SignalCharts".to_string(),
            svg_chart_markers: strings(&["chart", "graph", "highcharts", "plot"]),
        }
    }
}

impl Default for ScriptPatterns {
    fn default() -> Self {
        Self {
            allowed: strings(&["core.js", "jquery", "highcharts", "charts", "signals"]),
            bootstrap: strings(&["window.mqGlobal", "window.__INITIAL_STATE__", "mqGlobal ="]),
            analytics: strings(&["gtag(", "dataLayer", "ym("]),
            core: strings(&["jquery", "core.js", "vendor", "highcharts", "/lib(s)?\\//"]),
        }
    }
}

impl Default for GeneralSelectors {
    fn default() -> Self {
        Self {
            signal_name: strings(&[".s-signal-header__name", "h1.title-min", "h1"]),
            author: strings(&[".s-signal-header__author a", ".s-signal-header__author"]),
            reliability: strings(&[".s-signal-header__reliability", ".s-indicators__reliability"]),
            price: strings(&[".s-signal-header__price", ".s-plain-card__price"]),
            subscribers: strings(&[".s-signal-header__subscribers"]),
            growth: strings(&[".s-signal-header__growth", ".s-indicators__item_growth .s-indicators__value"]),
            max_drawdown: strings(&[".s-signal-header__drawdown", ".s-indicators__item_drawdown .s-indicators__value"]),
            age: strings(&[".s-signal-header__age"]),
            description: strings(&[".s-signal-description"]),
        }
    }
}

impl Default for PairSelectors {
    fn default() -> Self {
        Self {
            item: ".s-list-info__item".to_string(),
            label: ".s-list-info__label".to_string(),
            value: ".s-list-info__value".to_string(),
        }
    }
}

impl Default for TableSelectors {
    fn default() -> Self {
        Self {
            table: ".signal-trading-history table".to_string(),
            row: "tr".to_string(),
            header_cell: "th".to_string(),
            cell: "td".to_string(),
        }
    }
}

impl Default for DistributionSelectors {
    fn default() -> Self {
        Self {
            row: ".signals-chart-dist__row".to_string(),
            symbol: ".signals-chart-dist__symbol".to_string(),
            value: ".signals-chart-dist__value".to_string(),
            bar: ".signals-chart-dist__bar".to_string(),
        }
    }
}

impl Default for CardSelectors {
    fn default() -> Self {
        Self {
            card: ".s-other-signal".to_string(),
            name: ".s-other-signal__name".to_string(),
            link: "a".to_string(),
        }
    }
}

impl SelectorConfig {
    /// Every CSS selector the structural extractor queries.
    #[must_use]
    pub fn extraction_selectors(&self) -> Vec<&str> {
        let g = &self.general;
        let mut out: Vec<&str> = [
            &g.signal_name,
            &g.author,
            &g.reliability,
            &g.price,
            &g.subscribers,
            &g.growth,
            &g.max_drawdown,
            &g.age,
            &g.description,
            &self.chart_containers,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect();
        for pairs in [&self.info_pairs, &self.statistics] {
            out.extend([pairs.item.as_str(), pairs.label.as_str(), pairs.value.as_str()]);
        }
        let t = &self.trades;
        out.extend([t.table.as_str(), t.row.as_str(), t.header_cell.as_str(), t.cell.as_str()]);
        let d = &self.distribution;
        out.extend([d.row.as_str(), d.symbol.as_str(), d.value.as_str(), d.bar.as_str()]);
        let c = &self.author_signals;
        out.extend([c.card.as_str(), c.name.as_str(), c.link.as_str()]);
        out
    }

    /// Load a selector configuration from a JSON file.
    ///
    /// Missing categories keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&content).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}
