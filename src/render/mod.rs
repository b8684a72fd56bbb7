//! Rendering extraction.
//!
//! The advanced tier hands the reduced page to a [`RenderBackend`], which
//! loads it (with or without script execution) and reports the rendered HTML
//! plus selected globals. Two chart passes then run on that output:
//!
//! - **JS pass**: candidate globals and the namespace object are checked for
//!   chart-shaped arrays ([`charts`])
//! - **SVG pass**: chart-like `<svg>` elements in the rendered HTML are copied
//!   out with decoded path points ([`svg`])
//!
//! Structural fields always come from the reduced HTML, not the rendered one.

pub mod charts;
#[cfg(feature = "chrome")]
pub mod chrome;
pub mod static_backend;
pub mod svg;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

#[cfg(feature = "chrome")]
pub use chrome::{ChromeBackend, CHROME_BACKEND};
pub use charts::{qualifies, ChartCollector, SeriesKind};
pub use static_backend::{StaticBackend, STATIC_BACKEND};
pub use svg::{decode_path, extract_svg_charts};

use crate::dom;
use crate::error::{Error, Result};
use crate::extractor::StaticExtractor;
use crate::gate::ResourceGate;
use crate::options::Options;
use crate::result::{JsCharts, SignalRecord};

/// Slack on top of `render_timeout + settle_delay` for backend startup and
/// globals collection before a render is abandoned.
pub const RENDER_GRACE: Duration = Duration::from_secs(5);

/// Render-time knobs shared by all backends.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Bound on the wait for `document.readyState == "complete"`.
    pub render_timeout: Duration,
    /// Pause after load before globals are read.
    pub settle_delay: Duration,
    /// Global variable names worth reading.
    pub chart_variables: Vec<String>,
    /// Namespace object walked for nested series; empty disables the walk.
    pub chart_namespace: String,
    /// Chromium binary; auto-detected when `None`.
    pub chrome_executable: Option<std::path::PathBuf>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from_options(&Options::default())
    }
}

impl RenderSettings {
    #[must_use]
    pub fn from_options(options: &Options) -> Self {
        Self {
            render_timeout: options.render_timeout,
            settle_delay: options.settle_delay,
            chart_variables: options.selectors.chart_variables.clone(),
            chart_namespace: options.selectors.chart_namespace.clone(),
            chrome_executable: options.chrome_executable.clone(),
        }
    }

    /// Upper bound on a whole backend call.
    #[must_use]
    pub fn render_deadline(&self) -> Duration {
        self.render_timeout + self.settle_delay + RENDER_GRACE
    }
}

/// One render request.
#[derive(Debug, Clone, Copy)]
pub struct RenderJob<'a> {
    pub html: &'a str,
    /// Page URL; relative resources resolve against it.
    pub url: &'a str,
    pub gate: &'a ResourceGate,
    pub settings: &'a RenderSettings,
}

/// What a backend hands back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedPage {
    /// Document HTML after rendering.
    pub html: String,
    /// Candidate globals that were defined, by name.
    pub globals: Map<String, Value>,
    /// Value of the namespace global, if defined.
    pub namespace: Option<Value>,
    /// Global function names containing "chart".
    pub chart_functions: Vec<String>,
    /// SVG elements inserted after load.
    pub svg_mutations: u64,
}

/// A way of rendering a page.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Render `job.html`. Must fail with [`Error::RenderTimeout`] when the
    /// load wait exceeds `job.settings.render_timeout`.
    async fn render(&self, job: &RenderJob<'_>) -> Result<RenderedPage>;
}

/// The backend used when none is injected: Chromium with the `chrome`
/// feature, the static backend otherwise.
#[must_use]
pub fn default_backend() -> Arc<dyn RenderBackend> {
    #[cfg(feature = "chrome")]
    {
        Arc::new(ChromeBackend::new())
    }
    #[cfg(not(feature = "chrome"))]
    {
        Arc::new(StaticBackend::new())
    }
}

/// Structural extraction plus chart recovery through a backend.
#[derive(Clone)]
pub struct RenderingExtractor {
    backend: Arc<dyn RenderBackend>,
    gate: Arc<ResourceGate>,
    settings: RenderSettings,
    structure: StaticExtractor,
}

impl std::fmt::Debug for RenderingExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderingExtractor")
            .field("backend", &self.backend.name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl RenderingExtractor {
    #[must_use]
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        gate: Arc<ResourceGate>,
        settings: RenderSettings,
        structure: StaticExtractor,
    ) -> Self {
        Self {
            backend,
            gate,
            settings,
            structure,
        }
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Extract structure and charts from the reduced `html`.
    ///
    /// The backend call is bounded by [`RenderSettings::render_deadline`].
    /// A timeout aborts with [`Error::RenderTimeout`] and a backend that never
    /// started aborts with [`Error::RenderUnavailable`]; any other render
    /// failure leaves the charts empty.
    pub async fn extract(&self, html: &str, url: &str) -> Result<SignalRecord> {
        let mut record = self.structure.extract(html, url)?;
        record.meta.parser_used = self.backend.name().to_string();

        let job = RenderJob {
            html,
            url,
            gate: &self.gate,
            settings: &self.settings,
        };

        let rendered = tokio::time::timeout(self.settings.render_deadline(), self.backend.render(&job))
            .await
            .unwrap_or_else(|_| Err(Error::RenderTimeout(self.settings.render_timeout)));

        match rendered {
            Ok(page) => {
                debug!(
                    url,
                    backend = self.backend.name(),
                    globals = page.globals.len(),
                    svg_mutations = page.svg_mutations,
                    "rendered page"
                );
                record.charts.js = Some(self.js_pass(&page));
                let doc = dom::parse(&page.html);
                record.charts.svg = extract_svg_charts(
                    &dom::root(&doc),
                    &self.structure.selectors().svg_chart_markers,
                );
            }
            Err(e) if e.aborts_render() => return Err(e),
            Err(e) => {
                warn!(url, backend = self.backend.name(), error = %e, "render failed, charts left empty");
                record.charts.js = Some(JsCharts::default());
                record.charts.svg = Vec::new();
            }
        }

        Ok(record)
    }

    fn js_pass(&self, page: &RenderedPage) -> JsCharts {
        let mut collector = ChartCollector::new();
        collector.offer_globals(&page.globals, &self.settings.chart_variables);
        if let Some(namespace) = &page.namespace {
            collector.offer_namespace(&self.settings.chart_namespace, namespace);
        }
        collector.add_functions(page.chart_functions.iter().cloned());
        collector.finish()
    }
}

/// Mock backends for tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Always fails with the given error.
    pub struct FailingBackend(pub fn() -> Error);

    #[async_trait]
    impl RenderBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn render(&self, _job: &RenderJob<'_>) -> Result<RenderedPage> {
            Err((self.0)())
        }
    }

    /// Never finishes.
    pub struct HangingBackend;

    #[async_trait]
    impl RenderBackend for HangingBackend {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn render(&self, _job: &RenderJob<'_>) -> Result<RenderedPage> {
            std::future::pending().await
        }
    }

    /// Returns a canned page.
    pub struct FixedBackend(pub RenderedPage);

    #[async_trait]
    impl RenderBackend for FixedBackend {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn render(&self, _job: &RenderJob<'_>) -> Result<RenderedPage> {
            Ok(self.0.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FailingBackend, FixedBackend, HangingBackend};
    use super::*;
    use crate::options::GatePolicy;
    use crate::selectors::SelectorConfig;
    use serde_json::json;

    const URL: &str = "https://www.mql5.com/en/signals/1";
    const REDUCED: &str = r#"<html><body>
        <div class="s-signal-header"><h1 class="s-signal-header__name">Alpha Signal</h1></div>
    </body></html>"#;

    fn extractor(backend: Arc<dyn RenderBackend>) -> RenderingExtractor {
        let selectors = Arc::new(SelectorConfig::default());
        let gate = Arc::new(ResourceGate::new(&selectors, GatePolicy::default()).unwrap());
        RenderingExtractor::new(
            backend,
            gate,
            RenderSettings::default(),
            StaticExtractor::new(selectors),
        )
    }

    #[tokio::test]
    async fn charts_come_from_rendered_output() {
        let mut globals = Map::new();
        globals.insert("balanceData".into(), json!([[1, 100], [2, 101]]));
        let page = RenderedPage {
            html: r#"<div class="signal-chart"><svg><path d="M0 0 L1 1"/></svg></div>"#.into(),
            globals,
            namespace: Some(json!({"equity": [{"x": 1, "y": 2}]})),
            chart_functions: vec!["drawChart".into()],
            svg_mutations: 1,
        };
        let record = extractor(Arc::new(FixedBackend(page)))
            .extract(REDUCED, URL)
            .await
            .unwrap();

        assert_eq!(record.info("signalName"), "Alpha Signal");
        assert_eq!(record.meta.parser_used, "fixed");
        let js = record.charts.js.unwrap();
        assert_eq!(js.raw_data.len(), 2);
        assert!(js.balance_chart.is_some());
        assert_eq!(js.raw_data[1].name, "SignalCharts.equity");
        assert!(js.equity_chart.is_some());
        assert_eq!(js.chart_functions, vec!["drawChart"]);
        assert_eq!(record.charts.svg.len(), 1);
        assert_eq!(record.charts.svg[0].elements.paths[0].points.len(), 2);
    }

    #[tokio::test]
    async fn render_errors_degrade_to_empty_charts() {
        let ex = extractor(Arc::new(FailingBackend(|| Error::Render("crashed".into()))));
        let record = ex.extract(REDUCED, URL).await.unwrap();
        assert_eq!(record.info("signalName"), "Alpha Signal");
        assert!(record.charts.js.unwrap().is_empty());
        assert!(record.charts.svg.is_empty());
    }

    #[tokio::test]
    async fn render_timeout_aborts() {
        let ex = extractor(Arc::new(FailingBackend(|| {
            Error::RenderTimeout(Duration::from_secs(10))
        })));
        let err = ex.extract(REDUCED, URL).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn unavailable_backend_aborts() {
        let ex = extractor(Arc::new(FailingBackend(|| {
            Error::RenderUnavailable("no chromium".into())
        })));
        let err = ex.extract(REDUCED, URL).await.unwrap_err();
        assert!(matches!(err, Error::RenderUnavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_backend_is_cut_off_at_the_deadline() {
        let selectors = Arc::new(SelectorConfig::default());
        let gate = Arc::new(ResourceGate::new(&selectors, GatePolicy::default()).unwrap());
        let settings = RenderSettings {
            render_timeout: Duration::from_millis(200),
            settle_delay: Duration::ZERO,
            ..RenderSettings::default()
        };
        let ex = RenderingExtractor::new(
            Arc::new(HangingBackend),
            gate,
            settings.clone(),
            StaticExtractor::new(selectors),
        );

        let started = tokio::time::Instant::now();
        let err = ex.extract(REDUCED, URL).await.unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Render timed out after 200ms");
        let elapsed = started.elapsed();
        assert!(elapsed >= settings.render_deadline());
        assert!(elapsed < settings.render_deadline() + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn non_markup_is_a_parse_error() {
        let ex = extractor(Arc::new(StaticBackend::new()));
        assert!(matches!(ex.extract("", URL).await, Err(Error::Parse(_))));
    }
}
