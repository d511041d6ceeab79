//! Supplier identity numbers (ח.פ. / ע.מ. and English equivalents).

use super::FieldExtractor;
use super::patterns::COMPANY_ID_TAGGED;

/// Keep only the digits of an identity number; Israeli ids have 8 or 9 of them.
pub fn clean_company_id(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    (8..=10).contains(&digits.len()).then_some(digits)
}

/// Company id extractor working on tagged identifiers only.
pub struct CompanyIdExtractor;

impl CompanyIdExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CompanyIdExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for CompanyIdExtractor {
    type Output = String;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<String> = Vec::new();
        for caps in COMPANY_ID_TAGGED.captures_iter(text) {
            // The capture may run into a neighbouring number
            let id = clean_company_id(&caps[1])
                .or_else(|| caps[1].split_whitespace().next().and_then(clean_company_id));
            if let Some(id) = id {
                if !results.contains(&id) {
                    results.push(id);
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hebrew_tags() {
        let extractor = CompanyIdExtractor::new();
        assert_eq!(extractor.extract("ח.פ. 514567890"), Some("514567890".to_string()));
        assert_eq!(extractor.extract("ע.מ: 03-1234567-8"), Some("0312345678".to_string()));
        assert_eq!(extractor.extract("עוסק מורשה 123456789"), Some("123456789".to_string()));
        assert_eq!(
            extractor.extract("ח.פ 514567890 03 5551234"),
            Some("514567890".to_string())
        );
    }

    #[test]
    fn test_english_tags() {
        let extractor = CompanyIdExtractor::new();
        assert_eq!(extractor.extract("VAT No. 987654321"), Some("987654321".to_string()));
        assert_eq!(extractor.extract("Company No: 51-456789-0"), Some("514567890".to_string()));
    }

    #[test]
    fn test_untagged_numbers_are_ignored() {
        assert!(CompanyIdExtractor::new().extract("Invoice 514567890").is_none());
        assert!(CompanyIdExtractor::new().extract("ח.פ. 12").is_none());
    }

    #[test]
    fn test_clean_company_id() {
        assert_eq!(clean_company_id(" 51-456789-0 "), Some("514567890".to_string()));
        assert_eq!(clean_company_id("1234"), None);
    }
}
