//! Chart series recovery from script globals.
//!
//! A global qualifies as a series when it is a non-empty array whose first
//! element is either an `{x, y}` object or a tuple of at least two values.
//! Qualifying series are kept raw and also slotted into balance / growth /
//! equity by name.

use serde_json::{Map, Value};

use crate::result::{JsCharts, RawSeries};

/// Maximum object depth walked inside the namespace global.
pub const NAMESPACE_DEPTH: usize = 4;

/// Chart a series name points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Balance,
    Growth,
    Equity,
}

impl SeriesKind {
    /// Classify by case-insensitive name substring.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.contains("balance") {
            Some(Self::Balance)
        } else if lower.contains("growth") {
            Some(Self::Growth)
        } else if lower.contains("equity") {
            Some(Self::Equity)
        } else {
            None
        }
    }
}

/// Whether `value` looks like chart data.
#[must_use]
pub fn qualifies(value: &Value) -> bool {
    let Value::Array(items) = value else {
        return false;
    };
    match items.first() {
        Some(Value::Object(point)) => point.contains_key("x") && point.contains_key("y"),
        Some(Value::Array(tuple)) => tuple.len() >= 2,
        _ => false,
    }
}

/// Builds a [`JsCharts`] from collected globals.
#[derive(Debug, Default)]
pub struct ChartCollector {
    charts: JsCharts,
}

impl ChartCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `data` under `name` if it qualifies. Returns whether it did.
    pub fn offer(&mut self, name: &str, data: &Value) -> bool {
        if !qualifies(data) {
            return false;
        }
        let slot = match SeriesKind::from_name(name) {
            Some(SeriesKind::Balance) => Some(&mut self.charts.balance_chart),
            Some(SeriesKind::Growth) => Some(&mut self.charts.growth_chart),
            Some(SeriesKind::Equity) => Some(&mut self.charts.equity_chart),
            None => None,
        };
        if let Some(slot) = slot {
            if slot.is_none() {
                *slot = Some(data.clone());
            }
        }
        self.charts.raw_data.push(RawSeries {
            name: name.to_string(),
            data: data.clone(),
        });
        true
    }

    /// Candidate globals, in candidate order.
    pub fn offer_globals(&mut self, globals: &Map<String, Value>, candidates: &[String]) {
        for name in candidates {
            if let Some(value) = globals.get(name) {
                self.offer(name, value);
            }
        }
    }

    /// Walk the namespace object, offering every nested member under its
    /// dotted path.
    pub fn offer_namespace(&mut self, name: &str, namespace: &Value) {
        self.walk(name, namespace, 0);
    }

    fn walk(&mut self, path: &str, value: &Value, depth: usize) {
        if self.offer(path, value) || depth >= NAMESPACE_DEPTH {
            return;
        }
        if let Value::Object(members) = value {
            for (key, member) in members {
                self.walk(&format!("{path}.{key}"), member, depth + 1);
            }
        }
    }

    pub fn add_functions(&mut self, names: impl IntoIterator<Item = String>) {
        for name in names {
            if !self.charts.chart_functions.contains(&name) {
                self.charts.chart_functions.push(name);
            }
        }
    }

    #[must_use]
    pub fn finish(self) -> JsCharts {
        self.charts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn qualification_rules() {
        assert!(qualifies(&json!([{"x": 1, "y": 2}])));
        assert!(qualifies(&json!([[1_700_000_000, 100.5], [1_700_000_100, 101.0]])));
        assert!(!qualifies(&json!([])));
        assert!(!qualifies(&json!([[1]])));
        assert!(!qualifies(&json!([{"x": 1}])));
        assert!(!qualifies(&json!([1, 2, 3])));
        assert!(!qualifies(&json!({"x": 1, "y": 2})));
    }

    #[test]
    fn classifies_by_name() {
        assert_eq!(SeriesKind::from_name("balanceData"), Some(SeriesKind::Balance));
        assert_eq!(SeriesKind::from_name("GrowthChartData"), Some(SeriesKind::Growth));
        assert_eq!(SeriesKind::from_name("equityData"), Some(SeriesKind::Equity));
        assert_eq!(SeriesKind::from_name("chartData"), None);
    }

    #[test]
    fn globals_fill_raw_and_named_slots() {
        let globals = json!({
            "balanceData": [[1, 100], [2, 110]],
            "chartData": [{"x": 1, "y": 5}],
            "equityData": [],
            "unrelated": [[1, 2]]
        });
        let candidates: Vec<String> = ["balanceData", "chartData", "equityData", "growthData"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();

        let mut collector = ChartCollector::new();
        collector.offer_globals(globals.as_object().unwrap(), &candidates);
        let charts = collector.finish();

        let names: Vec<&str> = charts.raw_data.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["balanceData", "chartData"]);
        assert_eq!(charts.balance_chart, Some(json!([[1, 100], [2, 110]])));
        assert!(charts.equity_chart.is_none());
        assert!(charts.growth_chart.is_none());
    }

    #[test]
    fn namespace_walk_uses_dotted_paths() {
        let ns = json!({
            "growth": {"series": [{"x": 1, "y": 2}]},
            "meta": {"title": "x"},
            "a": {"b": {"c": {"d": {"e": [[1, 2]]}}}}
        });

        let mut collector = ChartCollector::new();
        collector.offer_namespace("SignalCharts", &ns);
        let charts = collector.finish();

        assert_eq!(charts.raw_data.len(), 1);
        assert_eq!(charts.raw_data[0].name, "SignalCharts.growth.series");
        assert!(charts.growth_chart.is_some());
    }

    #[test]
    fn functions_are_deduplicated() {
        let mut collector = ChartCollector::new();
        collector.add_functions(vec!["drawChart".to_string(), "drawChart".to_string()]);
        assert_eq!(collector.finish().chart_functions, vec!["drawChart"]);
    }
}
