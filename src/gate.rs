//! Sub-resource gate consulted while rendering.
//!
//! For every script, stylesheet, image or other request issued by the page
//! under render, the gate answers allow, stub (serve an empty 200 so the page
//! keeps going) or block.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::Result;
use crate::options::GatePolicy;
use crate::patterns::{any_match, compile_all, TextPattern};
use crate::selectors::SelectorConfig;
use crate::url_utils::is_same_site;

/// Path segment that marks signal pages and their own endpoints.
const SIGNAL_SEGMENT: &str = "/signals/";

const IMAGE_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".ico", ".bmp", ".avif",
];
const FONT_MEDIA_EXTENSIONS: &[&str] = &[
    ".woff", ".woff2", ".ttf", ".otf", ".eot", ".mp4", ".webm", ".mp3",
];

/// Outcome for one sub-resource request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateDecision {
    Allow,
    /// Answer with a zero-byte body instead of loading.
    Stub,
    /// Fail the request.
    Block,
}

/// Coarse resource class inferred from the URL path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Script,
    Style,
    Image,
    FontOrMedia,
    Other,
}

impl ResourceKind {
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let path = url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if path.ends_with(".js") || path.ends_with(".mjs") {
            Self::Script
        } else if path.ends_with(".css") {
            Self::Style
        } else if IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            Self::Image
        } else if FONT_MEDIA_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            Self::FontOrMedia
        } else {
            Self::Other
        }
    }
}

/// Allow/stub/block counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStats {
    pub allowed: u64,
    pub stubbed: u64,
    pub blocked: u64,
}

/// Resource policy shared by all renders of one scraper.
#[derive(Debug)]
pub struct ResourceGate {
    scripts: Vec<TextPattern>,
    styles: Vec<TextPattern>,
    policy: GatePolicy,
    allowed: AtomicU64,
    stubbed: AtomicU64,
    blocked: AtomicU64,
}

impl ResourceGate {
    /// Build from the allow-lists in `selectors` and the given policy.
    pub fn new(selectors: &SelectorConfig, policy: GatePolicy) -> Result<Self> {
        Ok(Self {
            scripts: compile_all(&selectors.scripts.allowed)?,
            styles: compile_all(&selectors.allowed_styles)?,
            policy,
            allowed: AtomicU64::new(0),
            stubbed: AtomicU64::new(0),
            blocked: AtomicU64::new(0),
        })
    }

    /// Decide for `resource_url`; `document_url` is the page being rendered.
    pub fn decide(&self, resource_url: &str, document_url: &str) -> GateDecision {
        let decision = self.classify(resource_url, document_url);
        let counter = match decision {
            GateDecision::Allow => &self.allowed,
            GateDecision::Stub => &self.stubbed,
            GateDecision::Block => &self.blocked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        trace!(url = resource_url, ?decision, "resource gate");
        decision
    }

    /// Whether the resource loads for real.
    pub fn should_load(&self, resource_url: &str, document_url: &str) -> bool {
        self.decide(resource_url, document_url) == GateDecision::Allow
    }

    fn classify(&self, resource_url: &str, document_url: &str) -> GateDecision {
        if resource_url == document_url || resource_url.contains(SIGNAL_SEGMENT) {
            return GateDecision::Allow;
        }

        let same_site = is_same_site(resource_url);
        match ResourceKind::from_url(resource_url) {
            kind @ (ResourceKind::Script | ResourceKind::Style) => {
                let patterns = if kind == ResourceKind::Script {
                    &self.scripts
                } else {
                    &self.styles
                };
                if any_match(patterns, resource_url) {
                    GateDecision::Allow
                } else if !same_site || self.policy.block_unlisted_same_domain {
                    GateDecision::Stub
                } else {
                    GateDecision::Allow
                }
            }
            ResourceKind::Image | ResourceKind::FontOrMedia => {
                if self.policy.load_images {
                    GateDecision::Allow
                } else {
                    GateDecision::Block
                }
            }
            ResourceKind::Other => {
                if same_site {
                    GateDecision::Allow
                } else {
                    GateDecision::Block
                }
            }
        }
    }

    #[must_use]
    pub fn stats(&self) -> GateStats {
        GateStats {
            allowed: self.allowed.load(Ordering::Relaxed),
            stubbed: self.stubbed.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "https://www.mql5.com/en/signals/123";

    fn gate(policy: GatePolicy) -> ResourceGate {
        ResourceGate::new(&SelectorConfig::default(), policy).unwrap()
    }

    #[test]
    fn document_and_signal_urls_always_allowed() {
        let gate = gate(GatePolicy::default());
        assert_eq!(gate.decide(DOC, DOC), GateDecision::Allow);
        assert_eq!(
            gate.decide("https://www.mql5.com/en/signals/123/history.js", DOC),
            GateDecision::Allow
        );
    }

    #[test]
    fn allow_listed_scripts_load() {
        let gate = gate(GatePolicy::default());
        assert!(gate.should_load("https://c.mql5.com/js/core.js?v=12", DOC));
        assert!(gate.should_load("https://cdn.example.com/highcharts.js", DOC));
        assert!(gate.should_load("https://c.mql5.com/css/all.css", DOC));
    }

    #[test]
    fn unlisted_scripts_are_stubbed() {
        let gate = gate(GatePolicy::default());
        assert_eq!(
            gate.decide("https://www.googletagmanager.com/gtm.js", DOC),
            GateDecision::Stub
        );
        assert_eq!(
            gate.decide("https://www.mql5.com/js/popup.js", DOC),
            GateDecision::Stub
        );
    }

    #[test]
    fn same_domain_policy_can_allow_unlisted() {
        let gate = gate(GatePolicy {
            block_unlisted_same_domain: false,
            ..GatePolicy::default()
        });
        assert_eq!(gate.decide("https://www.mql5.com/js/popup.js", DOC), GateDecision::Allow);
        assert_eq!(
            gate.decide("https://ads.example.net/tag.js", DOC),
            GateDecision::Stub
        );
    }

    #[test]
    fn images_blocked_unless_enabled() {
        let strict = gate(GatePolicy::default());
        assert_eq!(strict.decide("https://c.mql5.com/i/logo.png", DOC), GateDecision::Block);

        let lenient = gate(GatePolicy {
            load_images: true,
            ..GatePolicy::default()
        });
        assert_eq!(lenient.decide("https://c.mql5.com/i/logo.png", DOC), GateDecision::Allow);
    }

    #[test]
    fn stats_track_decisions() {
        let gate = gate(GatePolicy::default());
        gate.decide(DOC, DOC);
        gate.decide("https://tracker.example/pixel.gif", DOC);
        gate.decide("https://tracker.example/t.js", DOC);
        gate.decide("https://tracker.example/beacon", DOC);

        assert_eq!(
            gate.stats(),
            GateStats {
                allowed: 1,
                stubbed: 1,
                blocked: 2
            }
        );
    }

    #[test]
    fn kind_ignores_query_and_case() {
        assert_eq!(ResourceKind::from_url("https://x/a.JS?v=1"), ResourceKind::Script);
        assert_eq!(ResourceKind::from_url("https://x/a.css#x"), ResourceKind::Style);
        assert_eq!(ResourceKind::from_url("https://x/api/data"), ResourceKind::Other);
    }
}
