//! Page acquisition with a TTL cache in front of the network.
//!
//! `PageFetcher` validates the signal URL, serves cached HTML when possible
//! and otherwise issues exactly one GET through a [`Transport`]. There is no
//! retry here; callers decide whether to try again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE, PRAGMA, REFERER,
    USER_AGENT,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::encoding::decode_body;
use crate::error::{Error, Result};
use crate::options::Options;
use crate::url_utils::{validate_signal_url, SITE_ORIGIN};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const BROWSER_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9,ru;q=0.8";

/// Raw response handed back by a transport.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// One-shot HTTP GET. Implemented by [`HttpTransport`]; tests substitute
/// counting fakes.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<TransportResponse>;
}

/// `reqwest` transport with a fixed browser-like header set.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration, max_redirects: usize) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE));
        headers.insert(REFERER, HeaderValue::from_static("https://www.mql5.com/en/signals"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    pub fn from_options(options: &Options) -> Result<Self> {
        Self::new(options.fetch_timeout, options.max_redirects)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?
            .to_vec();

        Ok(TransportResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Per-call fetch switches.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Skip the cache lookup. The fresh page is still written back.
    pub bypass_cache: bool,
    /// Qualifies the cache key as `<cache_key>::<url>`.
    pub cache_key: Option<String>,
}

/// HTML returned by [`PageFetcher::fetch`].
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
    pub from_cache: bool,
    pub cached_at: Option<DateTime<Utc>>,
}

/// Monotonic request counters, reset only with the fetcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStats {
    /// Network requests issued.
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub cache_hits: u64,
}

/// Fetches signal pages through a transport and an optional cache.
pub struct PageFetcher {
    transport: Arc<dyn Transport>,
    cache: Option<CacheStore<String>>,
    total: AtomicU64,
    success: AtomicU64,
    failed: AtomicU64,
    cache_hits: AtomicU64,
}

impl std::fmt::Debug for PageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFetcher")
            .field("cache", &self.cache)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl PageFetcher {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, cache: Option<CacheStore<String>>) -> Self {
        Self {
            transport,
            cache,
            total: AtomicU64::new(0),
            success: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    /// Fetcher with the cache described by `options`.
    #[must_use]
    pub fn with_options(transport: Arc<dyn Transport>, options: &Options) -> Self {
        let cache = options.cache_enabled.then(|| {
            CacheStore::from_location(&options.cache_location, "pages", options.cache_ttl)
        });
        Self::new(transport, cache)
    }

    /// Fetch the HTML of a signal page.
    ///
    /// The URL is validated before the cache or network is touched.
    pub async fn fetch(&self, url: &str, opts: &FetchOptions) -> Result<FetchedPage> {
        validate_signal_url(url)?;

        let key = cache_key(url, opts.cache_key.as_deref());

        if let Some(cache) = &self.cache {
            if !opts.bypass_cache {
                if let Some(entry) = cache.get(&key) {
                    self.cache_hits.fetch_add(1, Ordering::Relaxed);
                    debug!(url, bytes = entry.data.len(), "page cache hit");
                    return Ok(FetchedPage {
                        url: url.to_string(),
                        html: entry.data,
                        from_cache: true,
                        cached_at: Some(entry.cached_at),
                    });
                }
            }
        }

        self.total.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let html = match self.fetch_network(url).await {
            Ok(html) => {
                self.success.fetch_add(1, Ordering::Relaxed);
                html
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(url, error = %e, "page fetch failed");
                return Err(e);
            }
        };
        info!(
            url,
            bytes = html.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "page fetched"
        );

        let mut cached_at = None;
        if let Some(cache) = &self.cache {
            match cache.put(&key, html.clone()) {
                Ok(entry) => cached_at = Some(entry.cached_at),
                Err(e) => warn!(url, error = %e, "page cache write failed"),
            }
        }

        Ok(FetchedPage {
            url: url.to_string(),
            html,
            from_cache: false,
            cached_at,
        })
    }

    async fn fetch_network(&self, url: &str) -> Result<String> {
        let response = self.transport.get(url).await?;

        if !(200..300).contains(&response.status) {
            return Err(Error::Fetch(format!("HTTP {} for {url}", response.status)));
        }
        if response.body.is_empty() {
            return Err(Error::Fetch(format!("empty response body for {url}")));
        }

        let (html, encoding) = decode_body(&response.body, response.content_type.as_deref());
        if html.trim().is_empty() {
            return Err(Error::Fetch(format!("empty response body for {url}")));
        }
        debug!(url, encoding = encoding.name(), "decoded response body");
        Ok(html)
    }

    /// Drop one cached page, or all of them. No-op without a cache.
    ///
    /// Clearing a URL also drops every `<cache_key>::<url>` entry stored for it.
    pub fn clear_cache(&self, url: Option<&str>) -> Result<()> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };
        match url {
            Some(url) => {
                cache.remove(url)?;
                let suffix = format!("::{url}");
                let removed = cache.remove_where(|key| key.ends_with(&suffix))?;
                debug!(url, qualified = removed, "cleared cached page");
                Ok(())
            }
            None => cache.clear(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> FetchStats {
        FetchStats {
            total: self.total.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }

    /// Origin that relative links on fetched pages resolve against.
    #[must_use]
    pub fn origin(&self) -> &'static str {
        SITE_ORIGIN
    }
}

fn cache_key(url: &str, qualifier: Option<&str>) -> String {
    match qualifier {
        Some(q) if !q.is_empty() => format!("{q}::{url}"),
        _ => url.to_string(),
    }
}
