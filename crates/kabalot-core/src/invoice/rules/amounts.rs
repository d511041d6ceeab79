//! Monetary amounts as written on invoices and as returned by the extraction model.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use super::patterns::AMOUNT_TOKEN;

/// Parse an amount written with either decimal convention.
///
/// The first amount-shaped token is read; currency symbols, labels and anything after it
/// (`117.00 (incl. 17% VAT)`) are ignored. A single separator followed by exactly three
/// digits is a thousands separator (`1,234` is 1234), otherwise it is the decimal point.
/// A leading minus or surrounding parentheses make the amount negative.
pub fn parse_amount(text: &str) -> Option<Decimal> {
    let trimmed = text.trim();
    let token = AMOUNT_TOKEN.find(trimmed)?;
    let negative = trimmed.starts_with('-')
        || trimmed[..token.start()].trim_end().ends_with('-')
        || (trimmed.starts_with('(') && trimmed.ends_with(')'));

    let cleaned = token.as_str();
    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        // 1.234,56
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        // 1,234.56
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(comma), None) => {
            let decimals = cleaned.len() - comma - 1;
            if decimals == 3 || cleaned.matches(',').count() > 1 {
                cleaned.replace(',', "")
            } else {
                cleaned.replace(',', ".")
            }
        }
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned.to_string(),
    };

    let amount = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -amount } else { amount })
}

/// Read an amount from a JSON value: numbers as-is, strings through [`parse_amount`].
pub fn amount_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let repr = n.to_string();
            Decimal::from_str(&repr)
                .or_else(|_| Decimal::from_scientific(&repr))
                .ok()
        }
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

/// Two amounts agree when they differ by no more than `tolerance`.
///
/// Amounts too far apart to subtract never agree.
pub fn amounts_agree(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    a.checked_sub(b).is_some_and(|diff| diff.abs() <= tolerance)
}

/// Sum of `amounts`, or `None` when it leaves the representable range.
pub fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
}
