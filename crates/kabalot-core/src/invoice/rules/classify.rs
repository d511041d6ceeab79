//! Expense category assignment.

use crate::models::invoice::ExpenseType;

use super::patterns::{OFFICE_OVERRIDE, classification_cues};

/// Why a category was chosen, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    OfficeOverride,
    ModelHint,
    ContentCues,
    Unresolved,
}

/// Assign an expense category.
///
/// Software, hosting and network services named in the document's `values` are office
/// expenses whatever else the page says. Otherwise a recognizable hint from the model is
/// used, then content cues over the full `text` (keys and values); a document with
/// neither is `?`.
pub fn classify(hint: Option<&str>, values: &str, text: &str) -> (ExpenseType, ClassificationSource) {
    if OFFICE_OVERRIDE.is_match(values) {
        return (ExpenseType::Office, ClassificationSource::OfficeOverride);
    }

    if let Some(expense) = hint.and_then(ExpenseType::parse) {
        if expense != ExpenseType::Unknown {
            return (expense, ClassificationSource::ModelHint);
        }
    }

    let mut best: Option<(ExpenseType, usize)> = None;
    for (expense, pattern) in classification_cues() {
        let score = pattern.find_iter(text).count();
        if score > 0 && best.is_none_or(|(_, top)| score > top) {
            best = Some((*expense, score));
        }
    }

    match best {
        Some((expense, _)) => (expense, ClassificationSource::ContentCues),
        None => (ExpenseType::Unknown, ClassificationSource::Unresolved),
    }
}
