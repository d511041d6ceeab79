//! Folding per-page extraction results into a normalized invoice record.

mod hints;
mod normalizer;
pub mod rules;

pub use hints::SummaryHints;
pub use normalizer::InvoiceNormalizer;

use crate::error::NormalizationError;

/// Result type for normalization operations.
pub type Result<T> = std::result::Result<T, NormalizationError>;
