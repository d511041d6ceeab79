//! Page extraction through an external document-understanding capability.

mod fake;
mod openai;
pub mod prompt;

pub use fake::FakeExtractionClient;
pub use openai::OpenAiExtractionClient;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ExtractionError;
use crate::raster::PageImage;

/// Untyped structured result for one page.
pub type RawPageResult = Value;

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// A capability that turns one page image into structured data.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// Extract structured data from a single page.
    async fn extract(&self, page: &PageImage) -> Result<RawPageResult>;
}

/// Parse a model response as structured data.
///
/// Markdown fences and prose around the outermost JSON object are tolerated; anything
/// else is [`ExtractionError::Unparseable`].
pub fn parse_response(content: &str) -> Result<RawPageResult> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) else {
        return Err(ExtractionError::Unparseable {
            reason: "no JSON object in response".to_string(),
        });
    };
    if end <= start {
        return Err(ExtractionError::Unparseable {
            reason: "malformed JSON object in response".to_string(),
        });
    }

    serde_json::from_str(&trimmed[start..=end]).map_err(|e| ExtractionError::Unparseable {
        reason: e.to_string(),
    })
}
