//! Invoice date recognition. Day-first is assumed for ambiguous numeric dates.

use chrono::NaiveDate;

use super::FieldExtractor;
use super::patterns::{DATE_DMY, DATE_YMD};

/// Date field extractor.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = NaiveDate;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<(usize, NaiveDate)> = Vec::new();

        // YYYY-MM-DD or YYYY/MM/DD
        for caps in DATE_YMD.captures_iter(text) {
            let year: i32 = caps[1].parse().unwrap_or(0);
            let month: u32 = caps[2].parse().unwrap_or(0);
            let day: u32 = caps[3].parse().unwrap_or(0);

            if let (Some(date), Some(m)) = (NaiveDate::from_ymd_opt(year, month, day), caps.get(0)) {
                results.push((m.start(), date));
            }
        }

        // DD.MM.YYYY or DD/MM/YY or DD-MM-YYYY
        for caps in DATE_DMY.captures_iter(text) {
            let day: u32 = caps[1].parse().unwrap_or(0);
            let month: u32 = caps[2].parse().unwrap_or(0);
            let year = parse_year(&caps[3]);

            if let (Some(date), Some(m)) = (NaiveDate::from_ymd_opt(year, month, day), caps.get(0)) {
                if !results.iter().any(|(_, d)| *d == date) {
                    results.push((m.start(), date));
                }
            }
        }

        results.sort_by_key(|(position, _)| *position);
        results.into_iter().map(|(_, date)| date).collect()
    }
}

/// Two-digit years are in the 2000s.
fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if year < 100 { 2000 + year } else { year }
}

/// Render a date the way summaries store it.
///
/// Recognized dates become ISO `YYYY-MM-DD`; anything else is kept as written.
pub fn normalize_date(text: &str) -> (String, Option<NaiveDate>) {
    match DateExtractor::new().extract(text) {
        Some(date) => (date.format("%Y-%m-%d").to_string(), Some(date)),
        None => (text.trim().to_string(), None),
    }
}
