//! Itemized rows and labelled values inside the opaque page data.
//!
//! The extraction model keeps the document's own keys, so nothing here relies on a fixed
//! schema: tables are arrays of row objects, and labelled values are found by key pattern.

use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use super::amounts::amount_from_value;
use super::patterns::{
    IDENTIFIER_KEY, ITEM_CHARGE_KEY, ITEM_PRICE_KEY, NET_KEY, RATE_KEY, SUMMARY_ROW, TOTAL_KEY, VAT_INCLUSIVE_KEY,
    VAT_KEY,
};

/// One chargeable table row.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub charge: Decimal,
    /// Every key and value of the row, for plate and keyword matching.
    pub text: String,
}

/// Flatten page data into `key: value` lines.
pub fn document_text<'a>(pages: impl IntoIterator<Item = &'a Map<String, Value>>) -> String {
    let mut lines = Vec::new();
    for page in pages {
        for (key, value) in page {
            flatten_into(key, value, &mut lines);
        }
    }
    lines.join("\n")
}

fn flatten_into(key: &str, value: &Value, lines: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            lines.push(key.to_string());
            for (k, v) in map {
                flatten_into(k, v, lines);
            }
        }
        Value::Array(items) => {
            lines.push(key.to_string());
            for item in items {
                flatten_into("", item, lines);
            }
        }
        Value::Null => lines.push(key.to_string()),
        Value::String(s) if key.is_empty() => lines.push(s.clone()),
        Value::String(s) => lines.push(format!("{key}: {s}")),
        other if key.is_empty() => lines.push(other.to_string()),
        other => lines.push(format!("{key}: {other}")),
    }
}

/// Flatten page data into its scalar values, one per line, without any keys.
pub fn document_values<'a>(pages: impl IntoIterator<Item = &'a Map<String, Value>>) -> String {
    let mut lines = Vec::new();
    for page in pages {
        for value in page.values() {
            values_into(value, &mut lines);
        }
    }
    lines.join("\n")
}

fn values_into(value: &Value, lines: &mut Vec<String>) {
    match value {
        Value::Object(map) => map.values().for_each(|v| values_into(v, lines)),
        Value::Array(items) => items.iter().for_each(|v| values_into(v, lines)),
        Value::Null | Value::Bool(_) => {}
        Value::String(s) => lines.push(s.clone()),
        Value::Number(n) => lines.push(n.to_string()),
    }
}

fn row_text(row: &Map<String, Value>) -> String {
    let mut lines = Vec::new();
    for (key, value) in row {
        flatten_into(key, value, &mut lines);
    }
    lines.join(" ")
}

fn is_summary_row(row: &Map<String, Value>) -> bool {
    row.values()
        .filter_map(Value::as_str)
        .any(|s| SUMMARY_ROW.is_match(s))
}

/// The charge of a row: a total-like column first, then a price column.
fn row_charge(row: &Map<String, Value>) -> Option<Decimal> {
    let by_key = |pattern: &Regex| {
        row.iter()
            .filter(|(key, _)| pattern.is_match(key) && !RATE_KEY.is_match(key))
            .find_map(|(_, value)| amount_from_value(value))
    };
    by_key(&ITEM_CHARGE_KEY).or_else(|| by_key(&ITEM_PRICE_KEY))
}

/// Every chargeable row of every table, in document order.
pub fn find_line_items<'a>(pages: impl IntoIterator<Item = &'a Map<String, Value>>) -> Vec<LineItem> {
    let mut items = Vec::new();
    for page in pages {
        for value in page.values() {
            collect_rows(value, &mut items);
        }
    }
    items
}

fn collect_rows(value: &Value, items: &mut Vec<LineItem>) {
    match value {
        Value::Array(elements) => {
            for element in elements {
                match element {
                    Value::Object(row) => {
                        if is_summary_row(row) {
                            continue;
                        }
                        if let Some(charge) = row_charge(row) {
                            items.push(LineItem {
                                charge,
                                text: row_text(row),
                            });
                        }
                    }
                    nested => collect_rows(nested, items),
                }
            }
        }
        Value::Object(map) => {
            for nested in map.values() {
                collect_rows(nested, items);
            }
        }
        _ => {}
    }
}

/// Amounts under labelled keys outside of tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelledAmounts {
    pub totals: Vec<Decimal>,
    pub vat: Option<Decimal>,
}

/// Collect labelled totals and the first labelled VAT amount.
pub fn labelled_amounts<'a>(pages: impl IntoIterator<Item = &'a Map<String, Value>>) -> LabelledAmounts {
    let mut found = LabelledAmounts::default();
    for page in pages {
        collect_labelled(page, &mut found);
    }
    found
}

fn collect_labelled(map: &Map<String, Value>, found: &mut LabelledAmounts) {
    for (key, value) in map {
        match value {
            Value::Object(nested) => collect_labelled(nested, found),
            // Table rows are items, not labels
            Value::Array(_) => {}
            scalar => {
                if RATE_KEY.is_match(key) || NET_KEY.is_match(key) || IDENTIFIER_KEY.is_match(key) {
                    continue;
                }
                let Some(amount) = amount_from_value(scalar) else {
                    continue;
                };
                if VAT_KEY.is_match(key) && !VAT_INCLUSIVE_KEY.is_match(key) {
                    found.vat.get_or_insert(amount);
                } else if TOTAL_KEY.is_match(key) {
                    found.totals.push(amount);
                }
            }
        }
    }
}

/// First scalar under a key matching `pattern`, as text.
pub fn labelled_text<'a>(
    pages: impl IntoIterator<Item = &'a Map<String, Value>>,
    pattern: &Regex,
) -> Option<String> {
    pages.into_iter().find_map(|page| find_labelled_text(page, pattern))
}

fn find_labelled_text(map: &Map<String, Value>, pattern: &Regex) -> Option<String> {
    for (key, value) in map {
        match value {
            Value::Object(nested) => {
                if let Some(found) = find_labelled_text(nested, pattern) {
                    return Some(found);
                }
            }
            Value::String(s) if pattern.is_match(key) && !s.trim().is_empty() => {
                return Some(s.trim().to_string());
            }
            Value::Number(n) if pattern.is_match(key) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// Matches registration plates from an allow-list, ignoring separators.
#[derive(Debug, Clone, Default)]
pub struct PlateMatcher {
    patterns: Vec<Regex>,
}

impl PlateMatcher {
    pub fn new<S: AsRef<str>>(plates: &[S]) -> Self {
        let patterns = plates
            .iter()
            .filter_map(|plate| {
                let digits: Vec<String> = plate
                    .as_ref()
                    .chars()
                    .filter(|c| c.is_ascii_digit())
                    .map(String::from)
                    .collect();
                if digits.is_empty() {
                    return None;
                }
                // 12-345-67, 12 345 67 and 1234567 are the same plate
                let body = digits.join(r"[\s.\-]?");
                Regex::new(&format!(r"(?:^|[^\d]){body}(?:[^\d]|$)")).ok()
            })
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }
}
