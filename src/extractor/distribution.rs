//! Symbol distribution bars and the author's other signals.

use dom_query::Selection;

use crate::dom::{attr_or_empty, select_each, select_first, tag_name, text_at};
use crate::patterns::WIDTH_PERCENT;
use crate::result::{AuthorSignal, DistributionItem};
use crate::selectors::{CardSelectors, DistributionSelectors};
use crate::url_utils::resolve_site_link;

/// Percentage from an inline `width: NN%` style, as written; `"0"` when absent.
#[must_use]
pub fn width_percentage(style: &str) -> String {
    WIDTH_PERCENT
        .captures(style)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| "0".to_string(), |m| m.as_str().to_string())
}

/// Distribution rows; rows without a symbol are dropped.
#[must_use]
pub fn extract_distribution(root: &Selection, selectors: &DistributionSelectors) -> Vec<DistributionItem> {
    select_each(root, &selectors.row)
        .iter()
        .filter_map(|row| {
            let symbol = text_at(row, &selectors.symbol);
            if symbol.is_empty() {
                return None;
            }
            let style = select_first(row, &selectors.bar)
                .map(|bar| attr_or_empty(&bar, "style"))
                .unwrap_or_default();
            Some(DistributionItem {
                symbol,
                value: text_at(row, &selectors.value),
                percentage: width_percentage(&style),
            })
        })
        .collect()
}

/// Other signals by the same author, links resolved against the site origin.
#[must_use]
pub fn extract_author_signals(root: &Selection, selectors: &CardSelectors) -> Vec<AuthorSignal> {
    select_each(root, &selectors.card)
        .iter()
        .filter_map(|card| {
            let name = text_at(card, &selectors.name);
            let href = if tag_name(card).as_deref() == Some("a") {
                attr_or_empty(card, "href")
            } else {
                select_first(card, &selectors.link)
                    .map(|a| attr_or_empty(&a, "href"))
                    .unwrap_or_default()
            };
            if name.is_empty() && href.trim().is_empty() {
                return None;
            }
            Some(AuthorSignal {
                name,
                url: resolve_site_link(&href),
            })
        })
        .collect()
}
