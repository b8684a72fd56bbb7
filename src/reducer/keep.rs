//! Keep-mode: rebuild a minimal document from allow-listed elements.

use std::collections::HashSet;
use std::fmt::Write as _;

use dom_query::{NodeId, Selection};
use tracing::debug;

use super::scripts::{order_scripts, PageScript, ScriptRules};
use crate::dom::{self, has_ancestor_in, in_head, outer_html};
use crate::error::{Error, Result};
use crate::patterns::{any_match, TextPattern};

pub(crate) struct KeepRules<'a> {
    pub selectors: &'a [String],
    pub scripts: &'a ScriptRules,
    pub styles: &'a [TextPattern],
}

/// Build the minimal document.
///
/// Fails on a malformed allow-list selector or when nothing matches, so the
/// caller can fall back to remove-mode.
pub(crate) fn reduce_keep(html: &str, rules: &KeepRules<'_>) -> Result<String> {
    for selector in rules.selectors {
        dom::compile(selector).map_err(|e| Error::Reduction(e.to_string()))?;
    }
    if rules.selectors.is_empty() {
        return Err(Error::Reduction("keep selector list is empty".to_string()));
    }

    let doc = dom::parse(html);
    let root = dom::root(&doc);

    // One grouped selector yields matches in document order without duplicates.
    let grouped = rules.selectors.join(", ");
    let matcher = dom::compile(&grouped).map_err(|e| Error::Reduction(e.to_string()))?;
    let matched = root.select_matcher(&matcher);

    let matched_ids: HashSet<NodeId> = matched.nodes().iter().map(|n| n.id).collect();
    let kept: Vec<_> = matched
        .nodes()
        .iter()
        .filter(|n| !in_head(n) && !has_ancestor_in(n, &matched_ids))
        .copied()
        .collect();

    if kept.is_empty() {
        return Err(Error::Reduction("no allowed elements matched".to_string()));
    }
    let kept_ids: HashSet<NodeId> = kept.iter().map(|n| n.id).collect();

    let mut head = String::new();
    push_head_metadata(&root, &mut head);
    push_styles(&root, rules.styles, &mut head);

    let scripts = collect_scripts(&root, rules.scripts, &kept_ids);
    let script_count = scripts.len();
    let (head_scripts, body_scripts) = order_scripts(scripts);
    for script in &head_scripts {
        head.push_str(&script.html);
        head.push('\n');
    }

    let mut body = String::new();
    for node in &kept {
        body.push_str(&outer_html(&Selection::from(*node)));
        body.push('\n');
    }
    for script in &body_scripts {
        body.push_str(&script.html);
        body.push('\n');
    }

    let lang = dom::select_first(&root, "html")
        .and_then(|h| h.attr("lang").map(|l| l.to_string()))
        .map(|l| format!(" lang=\"{}\"", escape_attr(&l)))
        .unwrap_or_default();

    let mut out = String::with_capacity(head.len() + body.len() + 64);
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html{lang}>\n<head>\n{head}</head>\n<body>\n{body}</body>\n</html>\n"
    );

    debug!(
        kept = kept.len(),
        scripts = script_count,
        bytes = out.len(),
        "keep-mode reduction"
    );
    Ok(out)
}

/// Charset, viewport and title. A charset declaration is synthesized when absent.
fn push_head_metadata(root: &Selection, head: &mut String) {
    match dom::select_first(root, "meta[charset]")
        .or_else(|| dom::select_first(root, "meta[http-equiv]"))
    {
        Some(meta) => head.push_str(&outer_html(&meta)),
        None => head.push_str("<meta charset=\"utf-8\">"),
    }
    head.push('\n');

    if let Some(viewport) = dom::select_first(root, "meta[name='viewport']") {
        head.push_str(&outer_html(&viewport));
        head.push('\n');
    }
    if let Some(title) = dom::select_first(root, "title") {
        head.push_str(&outer_html(&title));
        head.push('\n');
    }
}

/// Allow-listed stylesheet links and every `<style>` in `<head>`.
fn push_styles(root: &Selection, styles: &[TextPattern], head: &mut String) {
    for link in dom::select_each(root, "link[rel~='stylesheet']") {
        let href = dom::attr_or_empty(&link, "href");
        if any_match(styles, &href) {
            head.push_str(&outer_html(&link));
            head.push('\n');
        }
    }
    for style in dom::select_each(root, "head style") {
        head.push_str(&outer_html(&style));
        head.push('\n');
    }
}

/// Scripts outside kept subtrees (those travel with their container).
fn collect_scripts(root: &Selection, rules: &ScriptRules, kept: &HashSet<NodeId>) -> Vec<PageScript> {
    let mut scripts = Vec::new();
    for script in dom::select_each(root, "script") {
        let Some(node) = script.nodes().first().copied() else {
            continue;
        };
        if kept.contains(&node.id) || has_ancestor_in(&node, kept) {
            continue;
        }

        let src = script
            .attr("src")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let body = script.text().to_string();
        if src.is_none() && body.trim().is_empty() {
            continue;
        }

        let tier = rules.classify(src.as_deref(), &body);
        if !rules.is_needed(src.as_deref(), tier) {
            continue;
        }

        scripts.push(PageScript {
            html: outer_html(&script).to_string(),
            src,
            tier,
            in_head: in_head(&node),
        });
    }
    scripts
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::compile_all;
    use crate::selectors::ScriptPatterns;

    fn keep(html: &str, selectors: &[&str]) -> Result<String> {
        let scripts = ScriptRules::new(&ScriptPatterns::default()).unwrap();
        let styles = compile_all(&["core.css".to_string()]).unwrap();
        let selectors: Vec<String> = selectors.iter().map(|s| (*s).to_string()).collect();
        reduce_keep(
            html,
            &KeepRules {
                selectors: &selectors,
                scripts: &scripts,
                styles: &styles,
            },
        )
    }

    const PAGE: &str = r#"<html lang="en"><head>
        <meta charset="utf-8">
        <meta name="viewport" content="width=device-width">
        <title>Alpha Signal</title>
        <link rel="stylesheet" href="https://c.mql5.com/css/core.css">
        <link rel="stylesheet" href="https://ads.example/ads.css">
        <script src="https://c.mql5.com/js/jquery.min.js"></script>
        <script>var chartReady = true;</script>
    </head><body>
        <nav>menu</nav>
        <div class="s-signal-header"><h1 class="s-signal-header__name">Alpha</h1></div>
        <div class="advertising">buy</div>
        <div class="signal-chart"><div class="signal-chart">inner</div></div>
        <script>window.mqGlobal = {lang: "en"};</script>
        <script src="https://ads.example/track.js"></script>
        <script>drawCharts();</script>
    </body></html>"#;

    #[test]
    fn keeps_only_allowed_elements_with_metadata() {
        let out = keep(PAGE, &[".s-signal-header", ".signal-chart"]).unwrap();

        assert!(out.contains("<meta charset=\"utf-8\">"));
        assert!(out.contains("viewport"));
        assert!(out.contains("<title>Alpha Signal</title>"));
        assert!(out.contains("<html lang=\"en\">"));
        assert!(out.contains("core.css"));
        assert!(!out.contains("ads.css"));
        assert!(out.contains("Alpha"));
        assert!(!out.contains("menu"));
        assert!(!out.contains("buy"));
        assert!(!out.contains("track.js"));
        // nested match is copied once, with its container
        assert_eq!(out.matches("inner").count(), 1);
    }

    #[test]
    fn promotes_bootstrap_script_into_head_first() {
        let out = keep(PAGE, &[".s-signal-header"]).unwrap();
        let head_end = out.find("</head>").unwrap();

        let boot = out.find("window.mqGlobal").unwrap();
        let jquery = out.find("jquery.min.js").unwrap();
        let ready = out.find("chartReady").unwrap();
        let draw = out.find("drawCharts").unwrap();

        assert!(boot < head_end);
        assert!(boot < jquery);
        assert!(jquery < ready);
        assert!(ready < head_end);
        assert!(draw > head_end);
    }

    #[test]
    fn synthesizes_charset_when_missing() {
        let out = keep("<html><body><div class='x'>x</div></body></html>", &[".x"]).unwrap();
        assert!(out.contains("<meta charset=\"utf-8\">"));
    }

    #[test]
    fn fails_without_matches_or_with_bad_selector() {
        assert!(matches!(keep(PAGE, &[".absent"]), Err(Error::Reduction(_))));
        assert!(matches!(keep(PAGE, &[".s-signal-header", "div["]), Err(Error::Reduction(_))));
    }
}
