//! DOM Operations Adapter
//!
//! Thin helpers over the `dom_query` crate used by the reducer and the
//! extractors. Selectors come from configuration, so every query goes through
//! a pre-compiled [`Matcher`]: a malformed selector is reported (or skipped)
//! instead of reaching the query engine.

use std::collections::HashSet;

pub use dom_query::{Document, Matcher, NodeId, NodeRef, Selection};
pub use tendril::StrTendril;

use crate::error::{Error, Result};
use crate::patterns::WHITESPACE_RUN;

// === Parsing ===

/// Parse HTML string into document
#[inline]
#[must_use]
pub fn parse(html: &str) -> Document {
    Document::from(html)
}

/// Selection wrapping the document node itself, for descendant queries.
#[inline]
#[must_use]
pub fn root(doc: &Document) -> Selection<'_> {
    Selection::from(doc.root())
}

// === Selector Compilation ===

/// Compile a CSS selector, failing with `Error::Config` when malformed.
pub fn compile(selector: &str) -> Result<Matcher> {
    Matcher::new(selector).map_err(|e| Error::Config(format!("invalid selector {selector:?}: {e:?}")))
}

// === Querying ===

/// All descendants of `root` matching `selector`.
///
/// Returns `None` for a malformed selector or when nothing matches.
#[must_use]
pub fn try_select<'a>(root: &Selection<'a>, selector: &str) -> Option<Selection<'a>> {
    let matcher = Matcher::new(selector).ok()?;
    let found = root.select_matcher(&matcher);
    found.exists().then_some(found)
}

/// Each matching descendant as its own single-node selection, in document order.
#[must_use]
pub fn select_each<'a>(root: &Selection<'a>, selector: &str) -> Vec<Selection<'a>> {
    try_select(root, selector)
        .map(|found| found.nodes().iter().map(|n| Selection::from(*n)).collect())
        .unwrap_or_default()
}

/// First matching descendant.
#[must_use]
pub fn select_first<'a>(root: &Selection<'a>, selector: &str) -> Option<Selection<'a>> {
    try_select(root, selector).map(|found| found.first())
}

// === Text Content ===

/// Text content of the selection with whitespace collapsed and trimmed.
#[must_use]
pub fn clean_text(sel: &Selection) -> String {
    let text: StrTendril = sel.text();
    WHITESPACE_RUN.replace_all(&text, " ").trim().to_string()
}

/// Cleaned text of the first match of `selector`, or empty string.
#[must_use]
pub fn text_at(root: &Selection, selector: &str) -> String {
    select_first(root, selector)
        .map(|s| clean_text(&s))
        .unwrap_or_default()
}

/// Cleaned text of the first selector (in priority order) with non-empty text.
#[must_use]
pub fn first_text(root: &Selection, selectors: &[String]) -> String {
    selectors
        .iter()
        .map(|s| text_at(root, s))
        .find(|t| !t.is_empty())
        .unwrap_or_default()
}

// === Attributes ===

/// Attribute value, or empty string.
#[inline]
#[must_use]
pub fn attr_or_empty(sel: &Selection, name: &str) -> String {
    sel.attr(name).map(|s| s.to_string()).unwrap_or_default()
}

/// Tag name (lowercase)
#[must_use]
pub fn tag_name(sel: &Selection) -> Option<String> {
    sel.nodes()
        .first()
        .and_then(dom_query::NodeRef::node_name)
        .map(|t| t.to_ascii_lowercase())
}

/// Get outer HTML content
#[inline]
#[must_use]
pub fn outer_html(sel: &Selection) -> StrTendril {
    sel.html()
}

// === Tree Navigation ===

/// Whether any proper ancestor of `node` is in `ids`.
#[must_use]
pub fn has_ancestor_in(node: &NodeRef, ids: &HashSet<NodeId>) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if ids.contains(&parent.id) {
            return true;
        }
        current = parent.parent();
    }
    false
}

/// Whether the element sits inside `<head>`.
#[must_use]
pub fn in_head(node: &NodeRef) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent
            .node_name()
            .is_some_and(|n| n.eq_ignore_ascii_case("head"))
        {
            return true;
        }
        current = parent.parent();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_rejects_malformed_selector() {
        assert!(compile("div > > p").is_err());
        assert!(compile("div[").is_err());
        assert!(compile(".ok-class td").is_ok());
    }

    #[test]
    fn try_select_handles_bad_and_empty() {
        let doc = parse("<div class='a'><p>x</p></div>");
        let root = root(&doc);
        assert!(try_select(&root, "div[").is_none());
        assert!(try_select(&root, ".missing").is_none());
        assert_eq!(try_select(&root, "p").unwrap().length(), 1);
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        let doc = parse("<p>  Alpha \n\t  Signal  </p>");
        assert_eq!(text_at(&root(&doc), "p"), "Alpha Signal");
    }

    #[test]
    fn first_text_skips_empty_matches() {
        let doc = parse("<h1 class='a'> </h1><h2 class='b'>Name</h2>");
        let selectors = vec![".a".to_string(), ".missing".to_string(), ".b".to_string()];
        assert_eq!(first_text(&root(&doc), &selectors), "Name");
    }

    #[test]
    fn ancestor_and_head_checks() {
        let doc = parse("<html><head><script id='s'></script></head><body><div id='d'><span id='x'></span></div></body></html>");
        let root = root(&doc);
        let div = select_first(&root, "#d").unwrap();
        let span = select_first(&root, "#x").unwrap();
        let script = select_first(&root, "#s").unwrap();

        let ids: HashSet<NodeId> = div.nodes().iter().map(|n| n.id).collect();
        assert!(has_ancestor_in(&span.nodes()[0], &ids));
        assert!(!has_ancestor_in(&div.nodes()[0], &ids));
        assert!(in_head(&script.nodes()[0]));
        assert!(!in_head(&span.nodes()[0]));
    }
}
