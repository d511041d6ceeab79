//! Invoice currency detection.

use regex::Regex;

use super::FieldExtractor;
use super::patterns::{CURRENCY_EUR, CURRENCY_GBP, CURRENCY_ILS, CURRENCY_USD};

fn markers() -> [(&'static str, &'static Regex); 4] {
    [
        ("ILS", &CURRENCY_ILS),
        ("USD", &CURRENCY_USD),
        ("EUR", &CURRENCY_EUR),
        ("GBP", &CURRENCY_GBP),
    ]
}

/// Normalize a currency as written by the model or on the page to an ISO 4217 code.
pub fn normalize_currency(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Some(trimmed.to_ascii_uppercase());
    }
    markers()
        .iter()
        .find(|(_, pattern)| pattern.is_match(trimmed))
        .map(|(code, _)| code.to_string())
}

/// Currency extractor: the most frequently marked currency in the text.
pub struct CurrencyExtractor;

impl CurrencyExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CurrencyExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for CurrencyExtractor {
    type Output = String;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    /// Every marked currency, most frequent first.
    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut counts: Vec<(&str, usize)> = markers()
            .iter()
            .map(|(code, pattern)| (*code, pattern.find_iter(text).count()))
            .filter(|(_, count)| *count > 0)
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.into_iter().map(|(code, _)| code.to_string()).collect()
    }
}

/// Currency of the invoice: the model's hint when recognizable, else the page text.
pub fn detect_currency(hint: Option<&str>, text: &str) -> Option<String> {
    hint.and_then(normalize_currency)
        .or_else(|| CurrencyExtractor::new().extract(text))
}
