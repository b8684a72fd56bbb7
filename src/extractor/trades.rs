//! Trade-history table.

use std::collections::BTreeMap;

use dom_query::Selection;

use super::labels::normalize_label;
use crate::dom::{clean_text, select_each, select_first};
use crate::result::Trade;
use crate::selectors::TableSelectors;

/// Trade fields in positional-default order, with the header keys that name them.
const FIELD_SYNONYMS: [&[&str]; 5] = [
    &["symbol", "instrument", "pair", "simvol"],
    &["time", "date", "openTime", "closeTime", "dateTime", "vremya", "vremyaOtkrytiya", "data"],
    &["type", "direction", "side", "tip", "operation"],
    &["volume", "lots", "lot", "size", "obem"],
    &["price", "openPrice", "entryPrice", "tsena", "tsenaOtkrytiya"],
];

/// Column index for each trade field.
///
/// A recognized header wins. An unrecognized field keeps its positional slot
/// unless another field's header claimed it, in which case it takes the lowest
/// column nobody claimed. No two fields share a column.
fn field_columns(headers: &[String]) -> [usize; 5] {
    let recognized: [Option<usize>; 5] = std::array::from_fn(|field| {
        headers
            .iter()
            .position(|h| FIELD_SYNONYMS[field].iter().any(|s| h.eq_ignore_ascii_case(s)))
    });

    let mut claimed: Vec<usize> = recognized.iter().flatten().copied().collect();
    let mut columns = [0; 5];
    for (field, found) in recognized.iter().enumerate() {
        columns[field] = match found {
            Some(idx) => *idx,
            None => {
                let slot = if claimed.contains(&field) {
                    (0..).find(|i| !claimed.contains(i)).unwrap_or(field)
                } else {
                    field
                };
                claimed.push(slot);
                slot
            }
        };
    }
    columns
}

/// Rows of the first table matching `selectors.table`.
///
/// Header-only rows and rows where every cell is empty are dropped.
#[must_use]
pub fn extract_trades(root: &Selection, selectors: &TableSelectors) -> Vec<Trade> {
    let Some(table) = select_first(root, &selectors.table) else {
        return Vec::new();
    };

    let headers: Vec<String> = select_each(&table, &selectors.header_cell)
        .iter()
        .map(|th| normalize_label(&clean_text(th)))
        .collect();
    let columns = field_columns(&headers);

    let mut trades = Vec::new();
    for row in select_each(&table, &selectors.row) {
        let cells: Vec<String> = select_each(&row, &selectors.cell)
            .iter()
            .map(clean_text)
            .collect();
        if cells.iter().all(String::is_empty) {
            continue;
        }

        let cell = |idx: usize| cells.get(idx).cloned().unwrap_or_default();
        let named: BTreeMap<String, String> = cells
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let key = headers
                    .get(i)
                    .filter(|h| !h.is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("column{i}"));
                (key, value.clone())
            })
            .collect();

        trades.push(Trade {
            symbol: cell(columns[0]),
            time: cell(columns[1]),
            trade_type: cell(columns[2]),
            volume: cell(columns[3]),
            price: cell(columns[4]),
            columns: named,
        });
    }
    trades
}
