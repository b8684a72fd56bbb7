//! Headless Chromium backend.
//!
//! Each render launches a browser, loads the reduced HTML into a blank page
//! with a `<base>` pointing at the signal URL, and answers every sub-resource
//! request through the [`ResourceGate`](crate::ResourceGate) via CDP Fetch
//! interception. Browser, page and interception are torn down on every path.

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, FulfillRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::ErrorReason;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{RenderBackend, RenderJob, RenderSettings, RenderedPage};
use crate::error::{Error, Result};
use crate::gate::GateDecision;
use crate::patterns::{BASE_TAG, HEAD_OPEN};

/// Backend name reported in `ParseMeta::parser_used`.
pub const CHROME_BACKEND: &str = "chrome";

const READY_POLL: Duration = Duration::from_millis(100);

/// Counts `<svg>` nodes inserted after load into `window.__svgMutations`.
const SVG_OBSERVER_JS: &str = r"(() => {
  window.__svgMutations = 0;
  const observer = new MutationObserver((records) => {
    for (const record of records) {
      for (const node of record.addedNodes) {
        if (node.nodeType !== 1) continue;
        if (node.tagName && node.tagName.toLowerCase() === 'svg') window.__svgMutations += 1;
        if (node.querySelectorAll) window.__svgMutations += node.querySelectorAll('svg').length;
      }
    }
  });
  observer.observe(document.documentElement, { childList: true, subtree: true });
  return true;
})()";

/// Globals collection. `__NAMES__` and `__NAMESPACE__` are replaced with JSON
/// literals before evaluation.
const COLLECT_GLOBALS_JS: &str = r"(() => {
  const names = __NAMES__;
  const ns = __NAMESPACE__;
  const seen = new WeakSet();
  const clean = (value, depth) => {
    if (value === null || value === undefined) return null;
    if (typeof value === 'function') return value.toString();
    if (typeof Node !== 'undefined' && value instanceof Node) return '[DOM Element]';
    if (typeof value !== 'object') return value;
    if (depth > 8 || seen.has(value)) return null;
    seen.add(value);
    if (Array.isArray(value)) return value.map((item) => clean(item, depth + 1));
    const out = {};
    for (const key of Object.keys(value)) {
      try { out[key] = clean(value[key], depth + 1); } catch (e) { out[key] = null; }
    }
    return out;
  };
  const globals = {};
  for (const name of names) {
    try {
      if (typeof window[name] !== 'undefined') globals[name] = clean(window[name], 0);
    } catch (e) {}
  }
  const namespace = ns && typeof window[ns] !== 'undefined' ? clean(window[ns], 0) : null;
  const chartFunctions = Object.keys(window).filter((key) => {
    try {
      return typeof window[key] === 'function' && key.toLowerCase().includes('chart');
    } catch (e) {
      return false;
    }
  });
  return { globals, namespace, chartFunctions, svgMutations: window.__svgMutations || 0 };
})()";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Collected {
    globals: Map<String, Value>,
    namespace: Option<Value>,
    chart_functions: Vec<String>,
    svg_mutations: u64,
}

fn render_err(e: impl Display) -> Error {
    Error::Render(e.to_string())
}

fn unavailable(e: impl Display) -> Error {
    Error::RenderUnavailable(e.to_string())
}

/// Make relative resource URLs resolve against `url`.
fn inject_base(html: &str, url: &str) -> String {
    if BASE_TAG.is_match(html) {
        return html.to_string();
    }
    let base = format!("<base href=\"{}\">", url.replace('"', "&quot;"));
    match HEAD_OPEN.find(html) {
        Some(head) => {
            let mut out = String::with_capacity(html.len() + base.len());
            out.push_str(&html[..head.end()]);
            out.push_str(&base);
            out.push_str(&html[head.end()..]);
            out
        }
        None => format!("{base}{html}"),
    }
}

fn collect_script(settings: &RenderSettings) -> Result<String> {
    let names = serde_json::to_string(&settings.chart_variables).map_err(render_err)?;
    let namespace = serde_json::to_string(&settings.chart_namespace).map_err(render_err)?;
    Ok(COLLECT_GLOBALS_JS
        .replace("__NAMES__", &names)
        .replace("__NAMESPACE__", &namespace))
}

/// Chromium via the DevTools protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeBackend;

impl ChromeBackend {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn launch(settings: &RenderSettings) -> Result<(Browser, JoinHandle<()>)> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--mute-audio")
            .window_size(1920, 1080);
        if let Some(path) = &settings.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(Error::RenderUnavailable)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(unavailable)?;

        // The handler drives the CDP connection and must be polled for the
        // browser to respond.
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!(error = %e, "browser handler event error");
                }
            }
        });

        Ok((browser, handle))
    }

    async fn render_in(browser: &Browser, job: &RenderJob<'_>) -> Result<RenderedPage> {
        let page = browser.new_page("about:blank").await.map_err(unavailable)?;
        let result = Self::intercepted(&page, job).await;
        if let Err(e) = page.close().await {
            debug!(error = %e, "closing page failed");
        }
        result
    }

    /// Run the load while answering paused requests; interception stops when
    /// the load finishes.
    async fn intercepted(page: &Page, job: &RenderJob<'_>) -> Result<RenderedPage> {
        let mut paused = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(render_err)?;
        page.execute(EnableParams::default()).await.map_err(render_err)?;

        let interception = async {
            while let Some(event) = paused.next().await {
                let url = event.request.url.as_str();
                let id = event.request_id.clone();
                let reply = match job.gate.decide(url, job.url) {
                    GateDecision::Allow => page.execute(ContinueRequestParams::new(id)).await.map(|_| ()),
                    GateDecision::Stub => page.execute(FulfillRequestParams::new(id, 200)).await.map(|_| ()),
                    GateDecision::Block => page
                        .execute(FailRequestParams::new(id, ErrorReason::BlockedByClient))
                        .await
                        .map(|_| ()),
                };
                if let Err(e) = reply {
                    trace!(url, error = %e, "interception reply failed");
                }
            }
        };

        tokio::select! {
            result = Self::load_and_collect(page, job) => result,
            () = interception => Err(Error::Render("request interception stream closed".to_string())),
        }
    }

    async fn wait_for_complete(page: &Page) -> Result<()> {
        loop {
            let state: String = page
                .evaluate("document.readyState")
                .await
                .map_err(render_err)?
                .into_value()
                .map_err(render_err)?;
            if state == "complete" {
                return Ok(());
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }

    async fn load_and_collect(page: &Page, job: &RenderJob<'_>) -> Result<RenderedPage> {
        let settings = job.settings;
        let html = inject_base(job.html, job.url);

        let load = async {
            page.set_content(html).await.map_err(render_err)?;
            page.evaluate(SVG_OBSERVER_JS).await.map_err(render_err)?;
            Self::wait_for_complete(page).await
        };
        tokio::time::timeout(settings.render_timeout, load)
            .await
            .map_err(|_| Error::RenderTimeout(settings.render_timeout))??;

        tokio::time::sleep(settings.settle_delay).await;

        let collected: Collected = page
            .evaluate(collect_script(settings)?)
            .await
            .map_err(render_err)?
            .into_value()
            .map_err(render_err)?;
        if collected.svg_mutations > 0 {
            debug!(url = job.url, count = collected.svg_mutations, "SVG inserted after load");
        }

        let rendered = page.content().await.map_err(render_err)?;

        Ok(RenderedPage {
            html: rendered,
            globals: collected.globals,
            namespace: collected.namespace.filter(|v| !v.is_null()),
            chart_functions: collected.chart_functions,
            svg_mutations: collected.svg_mutations,
        })
    }
}

#[async_trait]
impl RenderBackend for ChromeBackend {
    fn name(&self) -> &'static str {
        CHROME_BACKEND
    }

    async fn render(&self, job: &RenderJob<'_>) -> Result<RenderedPage> {
        let started = std::time::Instant::now();
        let (mut browser, handler) = Self::launch(job.settings).await?;

        let result = Self::render_in(&browser, job).await;

        if let Err(e) = browser.close().await {
            debug!(error = %e, "closing browser failed");
        }
        let _ = browser.wait().await;
        handler.abort();

        let stats = job.gate.stats();
        debug!(
            url = job.url,
            elapsed_ms = started.elapsed().as_millis(),
            allowed = stats.allowed,
            stubbed = stats.stubbed,
            blocked = stats.blocked,
            ok = result.is_ok(),
            "chrome render finished"
        );
        result
    }
}
