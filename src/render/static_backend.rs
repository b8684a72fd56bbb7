//! Script-free rendering backend.
//!
//! Nothing is executed. Globals are recovered from plain assignments in
//! inline scripts (`var balanceData = [...];`) when the literal is valid JSON,
//! which covers pages that embed chart data as serialized arrays.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use super::{RenderBackend, RenderJob, RenderedPage};
use crate::dom::{self, select_each};
use crate::error::Result;
use crate::patterns::JS_FUNCTION_DECL;

/// Backend name reported in `ParseMeta::parser_used`.
pub const STATIC_BACKEND: &str = "static-render";

/// Regex for `var|let|const|window.NAME = <literal>;` where the literal opens
/// with `open` and closes with `close`.
fn assignment_regex(name: &str, open: char, close: char) -> Option<Regex> {
    let pattern = format!(
        r"(?s)(?:\bvar|\blet|\bconst|\bwindow\.)\s*{}\s*=\s*(\{}.*?\{})\s*;",
        regex::escape(name),
        open,
        close
    );
    Regex::new(&pattern).ok()
}

fn find_literal(scripts: &[String], re: &Regex) -> Option<Value> {
    scripts.iter().find_map(|body| {
        re.captures_iter(body)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| serde_json::from_str::<Value>(m.as_str()).ok())
    })
}

/// Recovers globals from inline script text.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticBackend;

impl StaticBackend {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn inline_scripts(html: &str) -> Vec<String> {
        let doc = dom::parse(html);
        select_each(&dom::root(&doc), "script")
            .iter()
            .filter(|s| !s.has_attr("src"))
            .map(|s| s.text().to_string())
            .filter(|body| !body.trim().is_empty())
            .collect()
    }
}

#[async_trait]
impl RenderBackend for StaticBackend {
    fn name(&self) -> &'static str {
        STATIC_BACKEND
    }

    async fn render(&self, job: &RenderJob<'_>) -> Result<RenderedPage> {
        let scripts = Self::inline_scripts(job.html);

        let mut globals = Map::new();
        for name in &job.settings.chart_variables {
            let Some(re) = assignment_regex(name, '[', ']') else {
                continue;
            };
            if let Some(value) = find_literal(&scripts, &re) {
                globals.insert(name.clone(), value);
            }
        }

        let namespace = if job.settings.chart_namespace.is_empty() {
            None
        } else {
            assignment_regex(&job.settings.chart_namespace, '{', '}')
                .and_then(|re| find_literal(&scripts, &re))
        };

        let mut chart_functions: Vec<String> = Vec::new();
        for body in &scripts {
            for caps in JS_FUNCTION_DECL.captures_iter(body) {
                let name = caps[1].to_string();
                if name.to_ascii_lowercase().contains("chart") && !chart_functions.contains(&name) {
                    chart_functions.push(name);
                }
            }
        }

        debug!(
            url = job.url,
            scripts = scripts.len(),
            globals = globals.len(),
            functions = chart_functions.len(),
            "static render"
        );

        Ok(RenderedPage {
            html: job.html.to_string(),
            globals,
            namespace,
            chart_functions,
            svg_mutations: 0,
        })
    }
}
