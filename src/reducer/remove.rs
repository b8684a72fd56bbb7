//! Remove-mode: delete block-listed elements, keep the rest.

use dom_query::{NodeRef, Selection};
use tracing::{debug, warn};

use crate::dom::{self, tag_name};
use crate::error::{Error, Result};
use crate::patterns::HTML_COMMENT;

/// `<meta charset>`, `<meta http-equiv>` and the viewport survive any selector.
pub(crate) fn is_protected_meta(node: &NodeRef) -> bool {
    let sel = Selection::from(*node);
    if tag_name(&sel).as_deref() != Some("meta") {
        return false;
    }
    sel.has_attr("charset")
        || sel.has_attr("http-equiv")
        || sel
            .attr("name")
            .is_some_and(|n| n.eq_ignore_ascii_case("viewport"))
}

/// Strip comments and every element matching `selectors`.
///
/// A malformed selector is logged and skipped. Fails only when the input is
/// not markup at all.
pub(crate) fn reduce_remove(html: &str, selectors: &[String]) -> Result<String> {
    if !html.contains('<') {
        return Err(Error::Reduction("input is not HTML markup".to_string()));
    }

    let without_comments = HTML_COMMENT.replace_all(html, "");
    let doc = dom::parse(&without_comments);
    let root = dom::root(&doc);

    let mut removed = 0usize;
    for selector in selectors {
        let matcher = match dom::compile(selector) {
            Ok(m) => m,
            Err(e) => {
                warn!(selector = selector.as_str(), error = %e, "skipping malformed remove selector");
                continue;
            }
        };
        let found = root.select_matcher(&matcher);
        for node in found.nodes() {
            if is_protected_meta(node) {
                continue;
            }
            Selection::from(*node).remove();
            removed += 1;
        }
    }

    debug!(removed, "remove-mode reduction");
    Ok(doc.html().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_matches_and_comments() {
        let html = r#"<html><head><meta charset="utf-8"></head><body>
            <!-- tracking pixel -->
            <nav>menu</nav>
            <div class="advertising">buy</div>
            <div class="s-signal-header">Alpha</div>
        </body></html>"#;
        let out = reduce_remove(html, &["nav".into(), ".advertising".into()]).unwrap();

        assert!(!out.contains("menu"));
        assert!(!out.contains("buy"));
        assert!(!out.contains("tracking pixel"));
        assert!(out.contains("Alpha"));
    }

    #[test]
    fn malformed_selector_is_skipped() {
        let html = "<html><body><nav>menu</nav><p>keep</p></body></html>";
        let out = reduce_remove(html, &["div[".into(), "nav".into()]).unwrap();
        assert!(!out.contains("menu"));
        assert!(out.contains("keep"));
    }

    #[test]
    fn charset_and_viewport_survive() {
        let html = r#"<html><head><meta charset="utf-8"><meta name="viewport" content="width=device-width"><meta name="robots" content="x"></head><body>b</body></html>"#;
        let out = reduce_remove(html, &["meta".into()]).unwrap();
        assert!(out.contains("charset"));
        assert!(out.contains("viewport"));
        assert!(!out.contains("robots"));
    }

    #[test]
    fn plain_text_is_rejected() {
        assert!(reduce_remove("no markup here", &[]).is_err());
    }
}
