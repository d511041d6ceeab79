//! Invoice normalizer: page folding, classification, vehicle attribution and VAT checks.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::NormalizationError;
use crate::exchange::ExchangeRates;
use crate::extraction::RawPageResult;
use crate::models::config::NormalizationConfig;
use crate::models::invoice::{InvoiceRecord, InvoiceSummary, PageResult, SUMMARY_KEY};

use super::hints::SummaryHints;
use super::rules::patterns::{DATE_KEY, INVOICE_NUMBER_KEY};
use super::rules::{
    ChargeFigures, CompanyIdExtractor, FieldExtractor, LineItem, PlateMatcher, checked_sum, classify,
    clean_company_id, detect_currency, document_text, document_values, find_line_items,
    labelled_amounts, labelled_text, normalize_date, reconcile,
};
use super::Result;

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Vehicle share of an invoice.
#[derive(Debug, Clone, Copy, PartialEq)]
struct VehicleShare {
    total: Decimal,
    related: u32,
    considered: u32,
    /// The plate appears only outside the item rows.
    whole_document: bool,
}

/// Turns per-page extraction results into one normalized invoice record.
pub struct InvoiceNormalizer {
    config: NormalizationConfig,
    plates: PlateMatcher,
    rates: Arc<dyn ExchangeRates>,
}

impl InvoiceNormalizer {
    pub fn new(config: NormalizationConfig, rates: Arc<dyn ExchangeRates>) -> Self {
        let plates = PlateMatcher::new(&config.vehicle_plates);
        Self {
            config,
            plates,
            rates,
        }
    }

    /// Normalize the pages of one document, in page order.
    ///
    /// The opaque part of every page is kept verbatim; exactly one page of the result
    /// carries the summary.
    pub async fn normalize(&self, raw_pages: Vec<RawPageResult>, source: &Path) -> Result<InvoiceRecord> {
        let mut pages = Vec::with_capacity(raw_pages.len().max(1));
        let mut hints = SummaryHints::default();
        let mut summary_index = None;
        let mut notes = Vec::new();

        for (index, raw) in raw_pages.into_iter().enumerate() {
            let mut fields = match raw {
                Value::Object(map) => map,
                other => {
                    return Err(NormalizationError::NotAnObject {
                        page: index,
                        found: json_kind(&other),
                    });
                }
            };

            match fields.remove(SUMMARY_KEY) {
                Some(Value::Object(block)) => {
                    hints.merge(SummaryHints::from_map(&block));
                    summary_index = Some(index);
                }
                Some(Value::Null) | None => {}
                Some(other) => notes.push(format!(
                    "page {index}: ignored invoice_summary that is a {}",
                    json_kind(&other)
                )),
            }

            pages.push(PageResult::with_fields(fields));
        }

        if pages.is_empty() {
            debug!(file = %source.display(), "No pages; synthesizing an empty page");
            pages.push(PageResult::empty());
        }

        let summary = self.summarize(&pages, hints, notes, source).await?;
        info!(
            file = %source.display(),
            type_code = summary.type_code.code(),
            total_charge = %summary.total_charge,
            notes = summary.notes.len(),
            "Normalized invoice"
        );

        let index = summary_index.unwrap_or(0);
        pages[index].summary = Some(summary);
        Ok(InvoiceRecord { pages })
    }

    async fn summarize(
        &self,
        pages: &[PageResult],
        hints: SummaryHints,
        mut notes: Vec<String>,
        source: &Path,
    ) -> Result<InvoiceSummary> {
        let opaque: Vec<&Map<String, Value>> = pages.iter().map(|p| &p.fields).collect();
        let text = document_text(opaque.iter().copied());
        let values = document_values(opaque.iter().copied());
        let items = find_line_items(opaque.iter().copied());
        let labelled = labelled_amounts(opaque.iter().copied());

        let mut summary = InvoiceSummary::default();

        let (expense, reason) = classify(hints.expense_type.as_deref(), &values, &text);
        debug!(file = %source.display(), ?expense, ?reason, "Classified invoice");
        summary.set_expense_type(expense);

        let item_sum = if items.is_empty() {
            None
        } else {
            let sum = checked_sum(items.iter().map(|i| i.charge))
                .ok_or(NormalizationError::AmountOverflow("item sum"))?;
            Some(sum)
        };
        let figures = ChargeFigures {
            stated_total: hints
                .total_charge
                .or_else(|| labelled.totals.iter().max().copied()),
            item_sum,
            vat: hints.vat_amount.or(labelled.vat),
            labelled_totals: labelled.totals.clone(),
        };
        let outcome = reconcile(&figures, self.config.amount_tolerance)?;
        notes.extend(outcome.notes);
        summary.vat_amount = outcome.vat_amount;
        summary.vat_included = outcome.vat_included;
        summary.vat_status = outcome.status;
        summary.total_charge = outcome.total;

        if expense.is_vehicle() {
            let share = self.vehicle_share(&items, outcome.total, &text)?;
            if self.plates.is_empty() {
                notes.push("no vehicle plates configured; nothing attributed".to_string());
            } else if share.whole_document {
                notes.push(format!(
                    "vehicle plate named outside the item rows; attributed all {} rows",
                    share.considered
                ));
            } else if share.related == 0 {
                notes.push("no configured vehicle plate found; nothing attributed".to_string());
            }
            summary.total_charge = if share.total.is_sign_negative() && !share.total.is_zero() {
                notes.push(format!(
                    "negative vehicle total {} recorded as its absolute value",
                    share.total
                ));
                share.total.abs()
            } else {
                share.total
            };
            summary.related_items = Some(share.related);
            summary.total_items = Some(share.considered);
        }

        let raw_date = hints
            .date_of_invoice
            .clone()
            .or_else(|| labelled_text(opaque.iter().copied(), &DATE_KEY));
        let mut date: Option<NaiveDate> = None;
        if let Some(raw) = raw_date {
            let (rendered, parsed) = normalize_date(&raw);
            date = parsed;
            summary.date_of_invoice = Some(rendered);
        }

        summary.invoice_number = hints
            .invoice_number
            .clone()
            .or_else(|| labelled_text(opaque.iter().copied(), &INVOICE_NUMBER_KEY));

        summary.company_id = hints
            .company_id
            .as_deref()
            .and_then(clean_company_id)
            .or_else(|| CompanyIdExtractor::new().extract(&text));

        let local = self.config.local_currency.to_ascii_uppercase();
        if let Some(currency) = detect_currency(hints.currency.as_deref(), &text) {
            if currency != local {
                let looked_up = match self.rates.rate(&currency, &local, date).await {
                    Ok(rate) => rate,
                    Err(e) => {
                        warn!(file = %source.display(), error = %e, "Exchange rate lookup failed");
                        notes.push(e.to_string());
                        None
                    }
                };
                let rate = looked_up.or(hints.exchange_rate);
                if rate.is_none() {
                    notes.push(format!("no exchange rate from {currency} to {local}"));
                }
                summary.currency = Some(currency);
                summary.exchange_rate = rate;
            }
        }

        summary.input_file = Some(source.display().to_string());
        summary.notes = notes;
        Ok(summary)
    }

    /// Attribute rows to allow-listed vehicles. A document without rows is one item.
    ///
    /// When no row names a plate but the rest of the document does, every row belongs to
    /// that vehicle and the whole invoice total is attributed.
    fn vehicle_share(&self, items: &[LineItem], invoice_total: Decimal, text: &str) -> Result<VehicleShare> {
        if items.is_empty() {
            let matched = self.plates.matches(text);
            return Ok(VehicleShare {
                total: if matched { invoice_total } else { Decimal::ZERO },
                related: u32::from(matched),
                considered: 1,
                whole_document: false,
            });
        }

        let considered = u32::try_from(items.len()).unwrap_or(u32::MAX);
        let related: Vec<&LineItem> = items.iter().filter(|item| self.plates.matches(&item.text)).collect();

        if related.is_empty() && self.plates.matches(text) {
            return Ok(VehicleShare {
                total: invoice_total,
                related: considered,
                considered,
                whole_document: true,
            });
        }

        let total = checked_sum(related.iter().map(|item| item.charge))
            .ok_or(NormalizationError::AmountOverflow("vehicle total"))?;
        Ok(VehicleShare {
            total,
            related: u32::try_from(related.len()).unwrap_or(u32::MAX),
            considered,
            whole_document: false,
        })
    }
}
