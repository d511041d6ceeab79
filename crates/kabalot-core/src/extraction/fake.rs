//! Deterministic in-memory extraction capability.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ExtractionClient, RawPageResult, Result, parse_response};
use crate::error::ExtractionError;
use crate::raster::PageImage;

#[derive(Debug, Clone)]
enum Scripted {
    Content(String),
    Failure(String),
}

/// Scripted responses keyed by source file name and page index.
///
/// Scripted content goes through [`parse_response`] exactly like a live response, so a
/// non-JSON script reproduces an extraction failure. Unscripted pages return `{}`.
#[derive(Debug, Default)]
pub struct FakeExtractionClient {
    responses: HashMap<(String, usize), Scripted>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl FakeExtractionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to `file_name` page `page` with the given JSON value.
    pub fn with_page(self, file_name: &str, page: usize, value: Value) -> Self {
        self.with_raw(file_name, page, &value.to_string())
    }

    /// Respond with raw model output.
    pub fn with_raw(mut self, file_name: &str, page: usize, content: &str) -> Self {
        self.responses.insert(
            (file_name.to_string(), page),
            Scripted::Content(content.to_string()),
        );
        self
    }

    /// Fail the call as a transport error.
    pub fn with_failure(mut self, file_name: &str, page: usize, reason: &str) -> Self {
        self.responses.insert(
            (file_name.to_string(), page),
            Scripted::Failure(reason.to_string()),
        );
        self
    }

    /// Every `(file name, page index)` extracted so far, in call order.
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ExtractionClient for FakeExtractionClient {
    async fn extract(&self, page: &PageImage) -> Result<RawPageResult> {
        let file_name = page
            .source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        if let Ok(mut calls) = self.calls.lock() {
            calls.push((file_name.clone(), page.index));
        }

        match self.responses.get(&(file_name, page.index)) {
            Some(Scripted::Content(content)) => parse_response(content),
            Some(Scripted::Failure(reason)) => Err(ExtractionError::Transport(reason.clone())),
            None => Ok(json!({})),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use std::path::PathBuf;

    fn page(name: &str, index: usize) -> PageImage {
        PageImage {
            index,
            source: PathBuf::from("in").join(name),
            image: DynamicImage::ImageRgb8(RgbImage::new(1, 1)),
        }
    }

    #[tokio::test]
    async fn test_scripted_pages_and_call_log() {
        let fake = FakeExtractionClient::new()
            .with_page("a.png", 0, json!({"x": 1}))
            .with_raw("b.png", 0, "not json at all")
            .with_failure("c.png", 0, "connection reset");

        assert_eq!(fake.extract(&page("a.png", 0)).await.unwrap(), json!({"x": 1}));
        assert_eq!(fake.extract(&page("a.png", 1)).await.unwrap(), json!({}));
        assert!(matches!(
            fake.extract(&page("b.png", 0)).await,
            Err(ExtractionError::Unparseable { .. })
        ));
        assert!(matches!(
            fake.extract(&page("c.png", 0)).await,
            Err(ExtractionError::Transport(_))
        ));

        assert_eq!(fake.calls().len(), 4);
        assert_eq!(fake.calls()[1], ("a.png".to_string(), 1));
    }
}
