//! Header fields and label/value blocks.

use std::collections::BTreeMap;

use dom_query::Selection;

use super::labels::{normalize_label, raw_label};
use crate::dom::{first_text, select_each, text_at};
use crate::result::GENERAL_INFO_KEYS;
use crate::selectors::{GeneralSelectors, PairSelectors};

/// Fixed header fields, every key present (empty when not found).
#[must_use]
pub fn extract_general(root: &Selection, selectors: &GeneralSelectors) -> BTreeMap<String, String> {
    let lists: [&[String]; 9] = [
        &selectors.signal_name,
        &selectors.author,
        &selectors.reliability,
        &selectors.price,
        &selectors.subscribers,
        &selectors.growth,
        &selectors.max_drawdown,
        &selectors.age,
        &selectors.description,
    ];

    GENERAL_INFO_KEYS
        .iter()
        .zip(lists)
        .map(|(key, list)| ((*key).to_string(), first_text(root, list)))
        .collect()
}

/// Repeating label/value items.
///
/// Each pair lands under the raw label and under its normalized key. A
/// normalized key never overwrites a non-empty value already in `into`.
pub fn merge_pairs(root: &Selection, selectors: &PairSelectors, into: &mut BTreeMap<String, String>) {
    for item in select_each(root, &selectors.item) {
        let label = raw_label(&text_at(&item, &selectors.label));
        if label.is_empty() {
            continue;
        }
        let value = text_at(&item, &selectors.value);

        let key = normalize_label(&label);
        if !key.is_empty() && key != label {
            let slot = into.entry(key).or_default();
            if slot.is_empty() {
                slot.clone_from(&value);
            }
        }
        into.insert(label, value);
    }
}

/// Label/value block as its own map.
#[must_use]
pub fn extract_pairs(root: &Selection, selectors: &PairSelectors) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    merge_pairs(root, selectors, &mut out);
    out
}
