//! Rule-based helpers for invoice normalization (Hebrew and English documents).

pub mod amounts;
pub mod classify;
pub mod company;
pub mod currency;
pub mod dates;
pub mod items;
pub mod patterns;
pub mod vat;

pub use amounts::{amount_from_value, amounts_agree, checked_sum, parse_amount};
pub use classify::{ClassificationSource, classify};
pub use company::{CompanyIdExtractor, clean_company_id};
pub use currency::{CurrencyExtractor, detect_currency, normalize_currency};
pub use dates::{DateExtractor, normalize_date};
pub use items::{
    LabelledAmounts, LineItem, PlateMatcher, document_text, document_values, find_line_items, labelled_amounts,
    labelled_text,
};
pub use vat::{ChargeFigures, VatOutcome, reconcile};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}
