//! Pipeline orchestration.
//!
//! [`Scraper::get_signal_data`] runs one request end to end:
//!
//! 1. validate and fetch (fatal on error)
//! 2. reduce (never fails)
//! 3. extract with the tier's strategy
//! 4. attach [`ParseMeta`]
//! 5. notify observers
//!
//! | tier       | input          | extractor                                  |
//! |------------|----------------|--------------------------------------------|
//! | `fast`     | unreduced HTML | static                                     |
//! | `normal`   | reduced HTML   | static                                     |
//! | `advanced` | reduced HTML   | rendering, static fallback on any error    |

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::cache::CacheStore;
use crate::error::Result;
use crate::extractor::{ensure_markup, StaticExtractor};
use crate::fetcher::{FetchOptions, FetchStats, HttpTransport, PageFetcher, Transport};
use crate::gate::{GateStats, ResourceGate};
use crate::options::{Options, ReductionMode, Tier};
use crate::reducer::HtmlReducer;
use crate::render::{default_backend, RenderBackend, RenderSettings, RenderingExtractor};
use crate::result::{ParseMeta, SignalRecord};
use crate::url_utils::{normalize_url, validate_signal_url};

/// `parser_used` when the advanced tier fell back to static extraction.
pub const STATIC_FALLBACK_PARSER: &str = "static-fallback";

/// Per-request switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    /// Overrides the scraper's current tier.
    pub tier: Option<Tier>,
    /// Skip page and result cache lookups. Fresh results are still cached.
    pub bypass_cache: bool,
}

impl RequestOptions {
    #[must_use]
    pub fn tier(tier: Tier) -> Self {
        Self {
            tier: Some(tier),
            ..Self::default()
        }
    }
}

/// Emitted after a record was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalParsed {
    pub url: String,
    pub tier: Tier,
    pub processing_time: Duration,
}

/// Emitted when a request failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailed {
    pub url: String,
    pub error: String,
}

/// Receives pipeline events. Both methods default to no-ops.
pub trait ParseObserver: Send + Sync {
    fn on_signal_parsed(&self, _event: &SignalParsed) {}
    fn on_error(&self, _event: &ParseFailed) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl ParseObserver for LoggingObserver {
    fn on_signal_parsed(&self, event: &SignalParsed) {
        info!(
            url = event.url.as_str(),
            tier = %event.tier,
            elapsed_ms = event.processing_time.as_millis() as u64,
            "signal parsed"
        );
    }

    fn on_error(&self, event: &ParseFailed) {
        error!(url = event.url.as_str(), error = event.error.as_str(), "signal parse failed");
    }
}

/// Signal page scraper. `Send + Sync`; share it behind an `Arc`.
pub struct Scraper {
    fetcher: PageFetcher,
    reducer: HtmlReducer,
    reduction_mode: ReductionMode,
    structure: StaticExtractor,
    rendering: RenderingExtractor,
    gate: Arc<ResourceGate>,
    tier: RwLock<Tier>,
    results: Option<CacheStore<SignalRecord>>,
    observers: RwLock<Vec<Arc<dyn ParseObserver>>>,
}

impl std::fmt::Debug for Scraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scraper")
            .field("tier", &self.tier())
            .field("reduction_mode", &self.reduction_mode)
            .field("fetcher", &self.fetcher)
            .field("rendering", &self.rendering)
            .field("results", &self.results)
            .finish_non_exhaustive()
    }
}

impl Scraper {
    /// Scraper with the HTTP transport and the default rendering backend.
    pub fn new(options: Options) -> Result<Self> {
        let transport = Arc::new(HttpTransport::from_options(&options)?);
        Self::with_parts(options, transport, default_backend())
    }

    /// Scraper with an injected transport and rendering backend.
    pub fn with_parts(
        options: Options,
        transport: Arc<dyn Transport>,
        backend: Arc<dyn RenderBackend>,
    ) -> Result<Self> {
        let selectors = Arc::new(options.selectors.clone());
        let gate = Arc::new(ResourceGate::new(&selectors, options.gate.clone())?);
        let structure = StaticExtractor::new(Arc::clone(&selectors));
        let rendering = RenderingExtractor::new(
            backend,
            Arc::clone(&gate),
            RenderSettings::from_options(&options),
            structure.clone(),
        );
        let results = options
            .result_cache_ttl
            .map(|ttl| CacheStore::from_location(&options.cache_location, "results", ttl));

        Ok(Self {
            fetcher: PageFetcher::with_options(transport, &options),
            reducer: HtmlReducer::from_options(&options)?,
            reduction_mode: options.reduction_mode,
            structure,
            rendering,
            gate,
            tier: RwLock::new(options.default_tier),
            results,
            observers: RwLock::new(Vec::new()),
        })
    }

    /// Fetch, reduce and extract one signal page.
    ///
    /// Only URL validation and fetch failures are fatal in every tier; the
    /// advanced tier degrades to static extraction on any rendering error.
    pub async fn get_signal_data(&self, url: &str, opts: &RequestOptions) -> Result<SignalRecord> {
        let tier = opts.tier.unwrap_or_else(|| self.tier());
        let started = Instant::now();

        let result = self.run(url, tier, opts.bypass_cache, started).await;
        match &result {
            Ok(_) => self.notify_parsed(&SignalParsed {
                url: url.to_string(),
                tier,
                processing_time: started.elapsed(),
            }),
            Err(e) => self.notify_error(&ParseFailed {
                url: url.to_string(),
                error: e.to_string(),
            }),
        }
        result
    }

    /// Run reduction and extraction on HTML already in hand (no fetch, no
    /// caching, no events).
    pub async fn parse_html(&self, html: &str, url: &str, tier: Tier) -> Result<SignalRecord> {
        self.process(html, url, tier, false, Instant::now()).await
    }

    async fn run(&self, url: &str, tier: Tier, bypass_cache: bool, started: Instant) -> Result<SignalRecord> {
        validate_signal_url(url)?;
        let result_key = result_cache_key(url, tier);

        if let Some(results) = &self.results {
            if !bypass_cache {
                if let Some(entry) = results.get(&result_key) {
                    debug!(url, %tier, "result cache hit");
                    let mut record = entry.data.clone();
                    record.meta.url = url.to_string();
                    record.meta.from_cache = true;
                    record.meta.cached_at = Some(entry.cached_at);
                    record.meta.cache_expires_at = Some(entry.expires_at(results.ttl()));
                    return Ok(record);
                }
            }
        }

        let page = self
            .fetcher
            .fetch(
                url,
                &FetchOptions {
                    bypass_cache,
                    cache_key: None,
                },
            )
            .await?;

        let mut record = self.process(&page.html, url, tier, page.from_cache, started).await?;

        if let Some(results) = &self.results {
            match results.put(&result_key, record.clone()) {
                Ok(entry) => {
                    record.meta.cached_at = Some(entry.cached_at);
                    record.meta.cache_expires_at = Some(entry.expires_at(results.ttl()));
                }
                Err(e) => warn!(url, error = %e, "result cache write failed"),
            }
        }
        Ok(record)
    }

    async fn process(
        &self,
        html: &str,
        url: &str,
        tier: Tier,
        from_cache: bool,
        started: Instant,
    ) -> Result<SignalRecord> {
        ensure_markup(html)?;
        let original_size = html.len();

        let (mut record, processed_size, reduction) = match tier {
            Tier::Fast => (self.structure.extract(html, url)?, original_size, "none".to_string()),
            Tier::Normal => {
                let reduced = self.reducer.process(html, self.reduction_mode);
                let record = self.structure.extract(&reduced.html, url)?;
                (record, reduced.reduced_size(), reduced.strategy.to_string())
            }
            Tier::Advanced => {
                let reduced = self.reducer.process(html, self.reduction_mode);
                let record = match self.rendering.extract(&reduced.html, url).await {
                    Ok(record) => record,
                    Err(e) => {
                        warn!(url, error = %e, "rendering extraction failed, using static extraction");
                        let mut record = self.structure.extract(&reduced.html, url)?;
                        record.meta.parser_used = STATIC_FALLBACK_PARSER.to_string();
                        record.meta.fallback_error = Some(e.to_string());
                        record
                    }
                };
                (record, reduced.reduced_size(), reduced.strategy.to_string())
            }
        };

        record.meta = ParseMeta {
            parsed_at: Utc::now(),
            processing_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            parser_used: std::mem::take(&mut record.meta.parser_used),
            tier,
            url: url.to_string(),
            original_size_bytes: original_size,
            processed_size_bytes: processed_size,
            reduction,
            from_cache,
            fallback_error: record.meta.fallback_error.take(),
            cached_at: None,
            cache_expires_at: None,
        };

        debug!(
            url,
            %tier,
            parser = record.meta.parser_used.as_str(),
            original = original_size,
            processed = processed_size,
            "record extracted"
        );
        Ok(record)
    }

    /// Drop cached pages and results for `url`, or everything.
    pub fn clear_cache(&self, url: Option<&str>) -> Result<()> {
        self.fetcher.clear_cache(url)?;
        if let Some(results) = &self.results {
            match url {
                Some(url) => {
                    for tier in [Tier::Fast, Tier::Normal, Tier::Advanced] {
                        results.remove(&result_cache_key(url, tier))?;
                    }
                }
                None => results.clear()?,
            }
        }
        Ok(())
    }

    /// Tier used when a request does not name one.
    #[must_use]
    pub fn tier(&self) -> Tier {
        *self.tier.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_tier(&self, tier: Tier) {
        *self.tier.write().unwrap_or_else(PoisonError::into_inner) = tier;
        debug!(%tier, "default tier changed");
    }

    pub fn subscribe(&self, observer: Arc<dyn ParseObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    #[must_use]
    pub fn fetch_stats(&self) -> FetchStats {
        self.fetcher.stats()
    }

    #[must_use]
    pub fn gate_stats(&self) -> GateStats {
        self.gate.stats()
    }

    fn observers(&self) -> Vec<Arc<dyn ParseObserver>> {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn notify_parsed(&self, event: &SignalParsed) {
        for observer in self.observers() {
            observer.on_signal_parsed(event);
        }
    }

    fn notify_error(&self, event: &ParseFailed) {
        for observer in self.observers() {
            observer.on_error(event);
        }
    }
}

fn result_cache_key(url: &str, tier: Tier) -> String {
    format!("{}::{tier}", normalize_url(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fetcher::TransportResponse;
    use crate::render::testing::FailingBackend;
    use crate::render::StaticBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const URL: &str = "https://www.mql5.com/en/signals/42";
    const PAGE: &str = r#"<html><head><meta charset="utf-8"><title>Alpha</title></head><body>
        <nav>menu</nav>
        <div class="s-signal-header"><h1 class="s-signal-header__name">Alpha Signal</h1></div>
        <script>var balanceData = [[1, 100], [2, 110]];</script>
    </body></html>"#;

    struct PageTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for PageTransport {
        async fn get(&self, _url: &str) -> Result<TransportResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TransportResponse {
                status: 200,
                content_type: Some("text/html; charset=utf-8".into()),
                body: PAGE.as_bytes().to_vec(),
            })
        }
    }

    #[derive(Default)]
    struct Recorder {
        parsed: Mutex<Vec<SignalParsed>>,
        failed: Mutex<Vec<ParseFailed>>,
    }

    impl ParseObserver for Recorder {
        fn on_signal_parsed(&self, event: &SignalParsed) {
            self.parsed.lock().unwrap().push(event.clone());
        }
        fn on_error(&self, event: &ParseFailed) {
            self.failed.lock().unwrap().push(event.clone());
        }
    }

    fn scraper(options: Options, backend: Arc<dyn RenderBackend>) -> (Scraper, Arc<PageTransport>) {
        let transport = Arc::new(PageTransport {
            calls: AtomicUsize::new(0),
        });
        let scraper = Scraper::with_parts(options, transport.clone(), backend).unwrap();
        (scraper, transport)
    }

    #[tokio::test]
    async fn normal_tier_fills_meta() {
        let (s, _) = scraper(Options::default(), Arc::new(StaticBackend::new()));
        let record = s.get_signal_data(URL, &RequestOptions::default()).await.unwrap();

        assert_eq!(record.info("signalName"), "Alpha Signal");
        assert_eq!(record.meta.url, URL);
        assert_eq!(record.meta.tier, Tier::Normal);
        assert_eq!(record.meta.parser_used, "static");
        assert_eq!(record.meta.reduction, "keep");
        assert_eq!(record.meta.original_size_bytes, PAGE.len());
        assert!(!record.meta.from_cache);
    }

    #[tokio::test]
    async fn fast_tier_skips_reduction() {
        let (s, _) = scraper(Options::default(), Arc::new(StaticBackend::new()));
        let record = s.get_signal_data(URL, &RequestOptions::tier(Tier::Fast)).await.unwrap();
        assert_eq!(record.meta.reduction, "none");
        assert_eq!(record.meta.processed_size_bytes, PAGE.len());
    }

    #[tokio::test]
    async fn advanced_tier_recovers_charts() {
        let (s, _) = scraper(Options::default(), Arc::new(StaticBackend::new()));
        let record = s
            .get_signal_data(URL, &RequestOptions::tier(Tier::Advanced))
            .await
            .unwrap();
        assert_eq!(record.meta.parser_used, "static-render");
        assert!(record.charts.js.unwrap().balance_chart.is_some());
    }

    #[tokio::test]
    async fn advanced_tier_falls_back_on_timeout() {
        let backend = Arc::new(FailingBackend(|| Error::RenderTimeout(Duration::from_secs(10))));
        let (s, _) = scraper(Options::default(), backend);
        let record = s
            .get_signal_data(URL, &RequestOptions::tier(Tier::Advanced))
            .await
            .unwrap();

        assert_eq!(record.meta.parser_used, STATIC_FALLBACK_PARSER);
        assert_eq!(record.meta.fallback_error.as_deref(), Some("Render timed out after 10000ms"));
        assert_eq!(record.info("signalName"), "Alpha Signal");
        assert!(record.charts.js.is_none());
    }

    #[tokio::test]
    async fn observers_see_success_and_failure() {
        let (s, transport) = scraper(Options::default(), Arc::new(StaticBackend::new()));
        let recorder = Arc::new(Recorder::default());
        s.subscribe(recorder.clone());

        s.get_signal_data(URL, &RequestOptions::default()).await.unwrap();
        let err = s
            .get_signal_data("https://evil.example/en/signals/1", &RequestOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidUrl(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.parsed.lock().unwrap().len(), 1);
        assert_eq!(recorder.parsed.lock().unwrap()[0].tier, Tier::Normal);
        assert_eq!(recorder.failed.lock().unwrap().len(), 1);
        assert_eq!(recorder.failed.lock().unwrap()[0].url, "https://evil.example/en/signals/1");
    }

    #[tokio::test]
    async fn result_cache_round_trip() {
        let options = Options {
            result_cache_ttl: Some(Duration::from_secs(60)),
            ..Options::default()
        };
        let (s, transport) = scraper(options, Arc::new(StaticBackend::new()));

        let first = s.get_signal_data(URL, &RequestOptions::default()).await.unwrap();
        assert!(first.meta.cached_at.is_some());
        assert!(first.meta.cache_expires_at.is_some());

        let second = s.get_signal_data(&format!("{URL}/"), &RequestOptions::default()).await.unwrap();
        assert!(second.meta.from_cache);
        assert_eq!(second.meta.url, format!("{URL}/"));
        assert_eq!(second.general_info, first.general_info);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

        s.clear_cache(Some(URL)).unwrap();
        let third = s.get_signal_data(URL, &RequestOptions::default()).await.unwrap();
        assert!(!third.meta.from_cache);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn tier_can_be_changed() {
        let (s, _) = scraper(Options::default(), Arc::new(StaticBackend::new()));
        assert_eq!(s.tier(), Tier::Normal);
        s.set_tier(Tier::Fast);
        let record = s.get_signal_data(URL, &RequestOptions::default()).await.unwrap();
        assert_eq!(record.meta.tier, Tier::Fast);
    }

    #[tokio::test]
    async fn parse_html_needs_no_network() {
        let (s, transport) = scraper(Options::default(), Arc::new(StaticBackend::new()));
        let record = s.parse_html(PAGE, "local", Tier::Normal).await.unwrap();
        assert_eq!(record.info("signalName"), "Alpha Signal");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }
}
