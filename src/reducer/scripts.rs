//! Script dependency tiers for keep-mode.
//!
//! Page scripts assume a load order: the global bootstrap object first, then
//! analytics init, then core/vendor libraries, then everything else. When the
//! minimal document is rebuilt, scripts are re-emitted in that order. Tiers
//! 1-3 always land in `<head>` (a body occurrence is promoted); tier 4 stays
//! where it was found.

use crate::error::Result;
use crate::patterns::{any_match, compile_all, TextPattern};
use crate::selectors::ScriptPatterns;

/// Load-order tier, lowest loads first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScriptTier {
    Bootstrap = 1,
    Analytics = 2,
    Core = 3,
    Other = 4,
}

/// A script collected from the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageScript {
    /// Serialized `<script>` element.
    pub html: String,
    pub src: Option<String>,
    pub tier: ScriptTier,
    pub in_head: bool,
}

/// Compiled script patterns.
#[derive(Debug, Clone)]
pub struct ScriptRules {
    allowed: Vec<TextPattern>,
    bootstrap: Vec<TextPattern>,
    analytics: Vec<TextPattern>,
    core: Vec<TextPattern>,
}

impl ScriptRules {
    pub fn new(patterns: &ScriptPatterns) -> Result<Self> {
        Ok(Self {
            allowed: compile_all(&patterns.allowed)?,
            bootstrap: compile_all(&patterns.bootstrap)?,
            analytics: compile_all(&patterns.analytics)?,
            core: compile_all(&patterns.core)?,
        })
    }

    /// Tier from the `src` URL or, for inline scripts, the body text.
    #[must_use]
    pub fn classify(&self, src: Option<&str>, body: &str) -> ScriptTier {
        let haystack = src.unwrap_or(body);
        if any_match(&self.bootstrap, haystack) {
            ScriptTier::Bootstrap
        } else if any_match(&self.analytics, haystack) {
            ScriptTier::Analytics
        } else if any_match(&self.core, haystack) {
            ScriptTier::Core
        } else {
            ScriptTier::Other
        }
    }

    /// Inline scripts are always needed; external ones only when allow-listed
    /// or part of a dependency tier.
    #[must_use]
    pub fn is_needed(&self, src: Option<&str>, tier: ScriptTier) -> bool {
        match src {
            None => true,
            Some(src) => tier != ScriptTier::Other || any_match(&self.allowed, src),
        }
    }
}

/// Split scripts into `(head, body)` emission order.
///
/// Within a tier, head occurrences precede body occurrences and source order
/// is otherwise preserved.
#[must_use]
pub fn order_scripts(scripts: Vec<PageScript>) -> (Vec<PageScript>, Vec<PageScript>) {
    let mut head: Vec<PageScript> = Vec::new();
    let mut body: Vec<PageScript> = Vec::new();
    let mut tiered: Vec<(usize, PageScript)> = Vec::new();

    for (idx, script) in scripts.into_iter().enumerate() {
        if script.tier == ScriptTier::Other {
            if script.in_head {
                tiered.push((idx, script));
            } else {
                body.push(script);
            }
        } else {
            tiered.push((idx, script));
        }
    }

    // Stable sort: tier, then head before body, then source order.
    tiered.sort_by_key(|(idx, s)| (s.tier, !s.in_head, *idx));
    head.extend(tiered.into_iter().map(|(_, s)| s));

    (head, body)
}
