//! VAT condition and total charge reconciliation.

use rust_decimal::Decimal;

use crate::error::NormalizationError;
use crate::models::invoice::VatStatus;

use super::amounts::amounts_agree;

/// Figures available for one invoice.
#[derive(Debug, Clone, Default)]
pub struct ChargeFigures {
    /// Total charge stated by the model or a labelled total on the page.
    pub stated_total: Option<Decimal>,
    /// Sum of all chargeable rows, if the invoice is itemized.
    pub item_sum: Option<Decimal>,
    pub vat: Option<Decimal>,
    /// Every labelled total found on the pages.
    pub labelled_totals: Vec<Decimal>,
}

/// Reconciled VAT fields and total.
#[derive(Debug, Clone, PartialEq)]
pub struct VatOutcome {
    pub total: Decimal,
    pub vat_amount: Option<Decimal>,
    pub vat_included: bool,
    pub status: VatStatus,
    pub notes: Vec<String>,
}

fn add_vat(net: Decimal, vat: Decimal) -> Result<Decimal, NormalizationError> {
    net.checked_add(vat)
        .ok_or(NormalizationError::AmountOverflow("VAT-inclusive total"))
}

/// Decide the VAT condition and the VAT-inclusive total.
pub fn reconcile(figures: &ChargeFigures, tolerance: Decimal) -> Result<VatOutcome, NormalizationError> {
    let mut notes = Vec::new();

    let status = match figures.vat {
        None => VatStatus::Absent,
        Some(v) if v.is_zero() => VatStatus::Zero,
        Some(_) => VatStatus::Present,
    };

    let total = match (status, figures.vat) {
        (VatStatus::Present, Some(vat)) => {
            let vat = vat.abs();
            match (figures.stated_total, figures.item_sum) {
                (Some(stated), Some(items)) if amounts_agree(stated, items, tolerance) => {
                    let gross = add_vat(stated, vat)?;
                    let net_confirmed = figures
                        .labelled_totals
                        .iter()
                        .any(|t| amounts_agree(*t, gross, tolerance));
                    if net_confirmed {
                        notes.push(format!("stated total {stated} was before VAT; added VAT {vat}"));
                        gross
                    } else {
                        stated
                    }
                }
                (Some(stated), _) => stated,
                (None, Some(items)) => {
                    notes.push(format!("no stated total; used item sum {items} plus VAT {vat}"));
                    add_vat(items, vat)?
                }
                (None, None) => {
                    notes.push("no total charge found".to_string());
                    Decimal::ZERO
                }
            }
        }
        _ => match (figures.stated_total, figures.item_sum) {
            (Some(stated), Some(items)) => {
                if !amounts_agree(stated, items, tolerance) {
                    notes.push(format!("stated total {stated} differs from item sum {items}"));
                }
                stated
            }
            (Some(stated), None) => stated,
            (None, Some(items)) => {
                notes.push(format!("no stated total; used item sum {items}"));
                items
            }
            (None, None) => {
                notes.push("no total charge found".to_string());
                Decimal::ZERO
            }
        },
    };

    let total = if total.is_sign_negative() && !total.is_zero() {
        notes.push(format!("negative total {total} recorded as its absolute value"));
        total.abs()
    } else {
        total
    };

    let (vat_amount, vat_included) = match status {
        VatStatus::Present => (figures.vat.map(|v| v.abs()), true),
        VatStatus::Zero | VatStatus::Absent => (None, false),
    };

    Ok(VatOutcome {
        total,
        vat_amount,
        vat_included,
        status,
        notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn tolerance() -> Decimal {
        d("0.05")
    }

    #[test]
    fn test_vat_present_gross_total() {
        let outcome = reconcile(
            &ChargeFigures {
                stated_total: Some(d("117.00")),
                item_sum: Some(d("100.00")),
                vat: Some(d("17.00")),
                labelled_totals: vec![d("117.00")],
            },
            tolerance(),
        )
        .unwrap();
        assert_eq!(outcome.total, d("117.00"));
        assert_eq!(outcome.vat_amount, Some(d("17.00")));
        assert!(outcome.vat_included);
        assert_eq!(outcome.status, VatStatus::Present);
        assert!(outcome.notes.is_empty());
    }

    #[test]
    fn test_vat_present_net_total_is_corrected() {
        let outcome = reconcile(
            &ChargeFigures {
                stated_total: Some(d("100.00")),
                item_sum: Some(d("100.00")),
                vat: Some(d("17.00")),
                labelled_totals: vec![d("100.00"), d("117.00")],
            },
            tolerance(),
        )
        .unwrap();
        assert_eq!(outcome.total, d("117.00"));
        assert_eq!(outcome.notes.len(), 1);
    }

    #[test]
    fn test_vat_inclusive_items_keep_stated_total() {
        let outcome = reconcile(
            &ChargeFigures {
                stated_total: Some(d("117.00")),
                item_sum: Some(d("117.00")),
                vat: Some(d("17.00")),
                labelled_totals: vec![d("117.00")],
            },
            tolerance(),
        )
        .unwrap();
        assert_eq!(outcome.total, d("117.00"));
    }

    #[test]
    fn test_vat_absent_mismatch_keeps_stated_with_note() {
        let outcome = reconcile(
            &ChargeFigures {
                stated_total: Some(d("50.00")),
                item_sum: Some(d("45.00")),
                vat: None,
                labelled_totals: vec![],
            },
            tolerance(),
        )
        .unwrap();
        assert_eq!(outcome.total, d("50.00"));
        assert_eq!(outcome.vat_amount, None);
        assert!(!outcome.vat_included);
        assert_eq!(outcome.status, VatStatus::Absent);
        assert!(outcome.notes[0].contains("differs"));
    }

    #[test]
    fn test_vat_zero_uses_item_sum_when_total_missing() {
        let outcome = reconcile(
            &ChargeFigures {
                stated_total: None,
                item_sum: Some(d("45.00")),
                vat: Some(Decimal::ZERO),
                labelled_totals: vec![],
            },
            tolerance(),
        )
        .unwrap();
        assert_eq!(outcome.total, d("45.00"));
        assert_eq!(outcome.status, VatStatus::Zero);
        assert_eq!(outcome.vat_amount, None);
    }

    #[test]
    fn test_negative_total_is_clamped() {
        let outcome = reconcile(
            &ChargeFigures {
                stated_total: Some(d("-20.00")),
                ..Default::default()
            },
            tolerance(),
        )
        .unwrap();
        assert_eq!(outcome.total, d("20.00"));
        assert!(outcome.notes.iter().any(|n| n.contains("negative")));
    }

    #[test]
    fn test_nothing_found() {
        let outcome = reconcile(&ChargeFigures::default(), tolerance()).unwrap();
        assert_eq!(outcome.total, Decimal::ZERO);
        assert_eq!(outcome.notes, vec!["no total charge found".to_string()]);
    }

    #[test]
    fn test_overflowing_gross_total_is_an_error() {
        let err = reconcile(
            &ChargeFigures {
                stated_total: None,
                item_sum: Some(Decimal::MAX),
                vat: Some(d("1")),
                labelled_totals: vec![],
            },
            tolerance(),
        )
        .unwrap_err();
        assert!(matches!(err, NormalizationError::AmountOverflow(_)));
    }
}
