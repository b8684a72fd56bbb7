//! HTML reduction.
//!
//! Signal pages ship several hundred kilobytes of navigation, ads and tracking
//! around a handful of data blocks. The reducer shrinks a page to those blocks
//! before extraction, using one of two strategies:
//!
//! - **keep**: rebuild a fresh document from allow-listed elements plus the
//!   scripts and styles they need to render
//! - **remove**: delete block-listed elements from the original document
//!
//! [`HtmlReducer::process`] never fails. A keep-mode failure falls back to
//! remove-mode (when enabled) and a remove-mode failure returns the original.

mod keep;
mod remove;
mod scripts;

use std::fmt;

use tracing::{debug, warn};

pub use scripts::{order_scripts, PageScript, ScriptRules, ScriptTier};

use crate::error::Result;
use crate::options::{Options, ReductionMode};
use crate::patterns::{compile_all, TextPattern};
use crate::selectors::SelectorConfig;

use keep::{reduce_keep, KeepRules};
use remove::reduce_remove;

/// Strategy that produced a [`Reduction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Keep,
    Remove,
    /// Keep-mode failed and remove-mode ran instead.
    RemoveFallback,
    /// Nothing could be reduced; the input is returned unchanged.
    Original,
}

impl Strategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::Remove => "remove",
            Self::RemoveFallback => "remove-fallback",
            Self::Original => "original",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of [`HtmlReducer::process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub html: String,
    pub strategy: Strategy,
    pub original_size: usize,
}

impl Reduction {
    #[must_use]
    pub fn reduced_size(&self) -> usize {
        self.html.len()
    }
}

/// Selector-driven page shrinker.
#[derive(Debug, Clone)]
pub struct HtmlReducer {
    keep: Vec<String>,
    remove: Vec<String>,
    scripts: ScriptRules,
    styles: Vec<TextPattern>,
    fallback: bool,
}

impl HtmlReducer {
    /// Compile the script and stylesheet patterns from `selectors`.
    ///
    /// Element selectors are checked lazily, per strategy.
    pub fn new(selectors: &SelectorConfig, fallback: bool) -> Result<Self> {
        Ok(Self {
            keep: selectors.keep.clone(),
            remove: selectors.remove.clone(),
            scripts: ScriptRules::new(&selectors.scripts)?,
            styles: compile_all(&selectors.allowed_styles)?,
            fallback,
        })
    }

    pub fn from_options(options: &Options) -> Result<Self> {
        Self::new(&options.selectors, options.reduction_fallback)
    }

    /// Reduce `html` with `mode`.
    #[must_use]
    pub fn process(&self, html: &str, mode: ReductionMode) -> Reduction {
        let original_size = html.len();
        let (reduced, strategy) = match mode {
            ReductionMode::Remove => self.remove_or_original(html, Strategy::Remove),
            ReductionMode::Keep => {
                let rules = KeepRules {
                    selectors: &self.keep,
                    scripts: &self.scripts,
                    styles: &self.styles,
                };
                match reduce_keep(html, &rules) {
                    Ok(out) => (out, Strategy::Keep),
                    Err(e) if self.fallback => {
                        warn!(error = %e, "keep-mode reduction failed, falling back to remove-mode");
                        self.remove_or_original(html, Strategy::RemoveFallback)
                    }
                    Err(e) => {
                        warn!(error = %e, "keep-mode reduction failed, using original HTML");
                        (html.to_string(), Strategy::Original)
                    }
                }
            }
        };

        let ratio = if original_size == 0 {
            1.0
        } else {
            reduced.len() as f64 / original_size as f64
        };
        debug!(
            strategy = %strategy,
            original = original_size,
            reduced = reduced.len(),
            ratio,
            "reduced HTML"
        );

        Reduction {
            html: reduced,
            strategy,
            original_size,
        }
    }

    fn remove_or_original(&self, html: &str, on_success: Strategy) -> (String, Strategy) {
        match reduce_remove(html, &self.remove) {
            Ok(out) => (out, on_success),
            Err(e) => {
                warn!(error = %e, "remove-mode reduction failed, using original HTML");
                (html.to_string(), Strategy::Original)
            }
        }
    }
}
