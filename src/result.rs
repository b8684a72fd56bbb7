//! Result types for extraction output.
//!
//! This module defines the normalized `SignalRecord` returned by the pipeline,
//! including structural fields, chart data and parse metadata. Everything
//! serializes to camelCase JSON for the calling web layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::options::Tier;

/// Normalized keys always present in `SignalRecord::general_info`.
pub const GENERAL_INFO_KEYS: [&str; 9] = [
    "signalName",
    "author",
    "reliability",
    "price",
    "subscribers",
    "growth",
    "maxDrawdown",
    "age",
    "description",
];

/// Structured data extracted from one signal page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRecord {
    /// Named header fields plus every label/value pair, keyed by both the raw
    /// label and its normalized camelCase form.
    pub general_info: BTreeMap<String, String>,

    /// Statistics block, keyed like `general_info`.
    pub statistics: BTreeMap<String, String>,

    pub trade_history: Vec<Trade>,

    pub distribution: Vec<DistributionItem>,

    pub author_signals: Vec<AuthorSignal>,

    /// Chart data; only `available` is filled by the static tiers.
    pub charts: ChartBundle,

    pub meta: ParseMeta,
}

impl SignalRecord {
    /// Look up a general-info value, returning `""` when absent.
    #[must_use]
    pub fn info(&self, key: &str) -> &str {
        self.general_info.get(key).map_or("", String::as_str)
    }
}

/// One row of the trade-history table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub symbol: String,
    pub time: String,
    #[serde(rename = "type")]
    pub trade_type: String,
    pub volume: String,
    pub price: String,

    /// Every cell keyed by its normalized header name.
    pub columns: BTreeMap<String, String>,
}

/// One row of the symbol distribution block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionItem {
    pub symbol: String,
    pub value: String,
    /// Bar width percentage as written in the style (`"37.5"`), `"0"` if absent.
    pub percentage: String,
}

/// Another signal published by the same author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSignal {
    pub name: String,
    pub url: String,
}

/// Chart data recovered from scripts and SVG.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartBundle {
    pub available: ChartAvailability,

    /// JS-variable pass output; `None` in static tiers.
    pub js: Option<JsCharts>,

    /// SVG pass output; empty in static tiers.
    pub svg: Vec<SvgChart>,
}

/// Boolean chart summary computed without rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartAvailability {
    pub has_chart_container: bool,
    pub has_svg: bool,
    pub has_chart_scripts: bool,
}

/// Series recovered from global variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsCharts {
    pub raw_data: Vec<RawSeries>,
    pub balance_chart: Option<Value>,
    pub growth_chart: Option<Value>,
    pub equity_chart: Option<Value>,
    /// Names of chart-related global functions.
    pub chart_functions: Vec<String>,
}

impl JsCharts {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw_data.is_empty() && self.chart_functions.is_empty()
    }
}

/// A qualifying array found under `name` (dotted path for namespace members).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSeries {
    pub name: String,
    pub data: Value,
}

/// An `<svg>` classified as a chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvgChart {
    /// Position among all `<svg>` elements of the document.
    pub index: usize,
    pub id: String,
    pub class: String,
    pub view_box: String,
    pub width: String,
    pub height: String,
    pub elements: SvgElements,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvgElements {
    pub paths: Vec<SvgPath>,
    pub circles: Vec<SvgCircle>,
    pub rects: Vec<SvgRect>,
    pub texts: Vec<SvgText>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvgPath {
    pub d: String,
    pub stroke: String,
    pub fill: String,
    pub stroke_width: String,
    pub class: String,
    /// Decoded M/L/H/V points; curve segments contribute none.
    pub points: Vec<PathPoint>,
}

/// Absolute pen position after a point-producing command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    /// Command letter as written (`M`, `l`, `H`, ...).
    pub command: char,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvgCircle {
    pub cx: String,
    pub cy: String,
    pub r: String,
    pub fill: String,
    pub class: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvgRect {
    pub x: String,
    pub y: String,
    pub width: String,
    pub height: String,
    pub fill: String,
    pub class: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvgText {
    pub x: String,
    pub y: String,
    pub content: String,
    pub class: String,
}

/// Observability metadata attached to every record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseMeta {
    pub parsed_at: DateTime<Utc>,
    pub processing_time_ms: u64,
    /// Strategy that produced the record, e.g. `static`, `chrome`, `static-fallback`.
    pub parser_used: String,
    pub tier: Tier,
    /// Input URL, verbatim.
    pub url: String,
    pub original_size_bytes: usize,
    pub processed_size_bytes: usize,
    /// Reduction strategy applied (`none` for the fast tier).
    pub reduction: String,
    pub from_cache: bool,
    /// Error that triggered the static fallback in the advanced tier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_expires_at: Option<DateTime<Utc>>,
}

impl Default for ParseMeta {
    fn default() -> Self {
        Self {
            parsed_at: Utc::now(),
            processing_time_ms: 0,
            parser_used: String::new(),
            tier: Tier::default(),
            url: String::new(),
            original_size_bytes: 0,
            processed_size_bytes: 0,
            reduction: String::new(),
            from_cache: false,
            fallback_error: None,
            cached_at: None,
            cache_expires_at: None,
        }
    }
}
