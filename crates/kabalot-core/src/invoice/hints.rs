//! Lenient reading of the model's own `invoice_summary` block.

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use super::rules::amount_from_value;

/// Values the extraction model suggested. None of them is trusted as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryHints {
    pub total_charge: Option<Decimal>,
    pub vat_amount: Option<Decimal>,
    pub date_of_invoice: Option<String>,
    pub invoice_number: Option<String>,
    pub company_id: Option<String>,
    pub currency: Option<String>,
    pub exchange_rate: Option<Decimal>,
    pub expense_type: Option<String>,
}

fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty() && !s.eq_ignore_ascii_case("null")).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn amount(map: &Map<String, Value>, key: &str) -> Option<Decimal> {
    map.get(key).and_then(amount_from_value)
}

impl SummaryHints {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            total_charge: amount(map, "total_charge"),
            vat_amount: amount(map, "vat_amount"),
            date_of_invoice: text(map, "date_of_invoice"),
            invoice_number: text(map, "invoice_number"),
            company_id: text(map, "company_id"),
            currency: text(map, "currency"),
            exchange_rate: amount(map, "exchange_rate"),
            // The code is more precise than the label
            expense_type: text(map, "type_code").or_else(|| text(map, "expense_type")),
        }
    }

    /// Merge a later page's hints; its non-null values win.
    pub fn merge(&mut self, later: SummaryHints) {
        self.total_charge = later.total_charge.or(self.total_charge);
        self.vat_amount = later.vat_amount.or(self.vat_amount);
        self.date_of_invoice = later.date_of_invoice.or(self.date_of_invoice.take());
        self.invoice_number = later.invoice_number.or(self.invoice_number.take());
        self.company_id = later.company_id.or(self.company_id.take());
        self.currency = later.currency.or(self.currency.take());
        self.exchange_rate = later.exchange_rate.or(self.exchange_rate);
        self.expense_type = later.expense_type.or(self.expense_type.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_lenient_reading() {
        let hints = SummaryHints::from_map(&map(json!({
            "total_charge": "1,170.00",
            "vat_amount": null,
            "invoice_number": 1001,
            "date_of_invoice": "null",
            "expense_type": "fuel"
        })));
        assert_eq!(hints.total_charge, Some(Decimal::from(1170)));
        assert_eq!(hints.vat_amount, None);
        assert_eq!(hints.invoice_number.as_deref(), Some("1001"));
        assert_eq!(hints.date_of_invoice, None);
        assert_eq!(hints.expense_type.as_deref(), Some("fuel"));
    }

    #[test]
    fn test_later_non_null_values_win() {
        let mut hints = SummaryHints::from_map(&map(json!({
            "total_charge": 10, "invoice_number": "A1", "currency": "ILS"
        })));
        hints.merge(SummaryHints::from_map(&map(json!({
            "total_charge": 25, "invoice_number": null
        }))));
        assert_eq!(hints.total_charge, Some(Decimal::from(25)));
        assert_eq!(hints.invoice_number.as_deref(), Some("A1"));
        assert_eq!(hints.currency.as_deref(), Some("ILS"));
    }
}
