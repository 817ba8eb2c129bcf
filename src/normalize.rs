//! Normalization of the model's text reply into an [`EnrichmentResponse`]
//!
//! The model is asked for bare JSON but regularly wraps it in a markdown code fence, sometimes
//! with a sentence of commentary around it. Normalization is a two step pipeline:
//!
//! 1. [`strip_code_fences`] reduces the raw text to the candidate JSON document.
//! 2. [`parse_enrichment`] parses it strictly and validates the shape contract.
//!
//! Nothing from the reply is trusted until both steps succeed.
use crate::models::{EXAMPLE_COUNT, EnrichmentResponse};
use serde_json::error::Category;

const FENCE: &str = "```";

/// Why a model reply could not be turned into an [`EnrichmentResponse`].
#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("upstream envelope could not be decoded: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("upstream reply carried no candidate text")]
    NoCandidateText,
    #[error("reply is not valid JSON: {0}")]
    NotJson(#[source] serde_json::Error),
    #[error("reply does not match the expected schema: {0}")]
    Schema(#[source] serde_json::Error),
    #[error("expected {} examples, found {found}", EXAMPLE_COUNT)]
    WrongExampleCount { found: usize },
    #[error("field `{0}` is blank")]
    BlankField(String),
}

/// Returns the JSON payload of a model reply with markdown fences and surrounding whitespace
/// removed.
///
/// Handles ```` ```json ```` (any language tag) and bare ```` ``` ```` openers, replies where
/// the fenced block is surrounded by commentary, and replies missing one of the two fence
/// lines. Text without any fence is only trimmed.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(open) = trimmed.find(FENCE) else {
        return trimmed;
    };

    let rest = &trimmed[open + FENCE.len()..];
    let after_open = skip_language_tag(rest);
    match after_open.find(FENCE) {
        Some(close) => after_open[..close].trim(),
        // Opening fence that is never closed.
        None if open == 0 || opens_block(rest) => after_open.trim(),
        // Closing fence with no opener: everything before it is the payload.
        None => trimmed[..open].trim(),
    }
}

/// A fence followed by a language tag or a line break starts a block.
fn opens_block(rest: &str) -> bool {
    rest.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '\n' || c == '\r')
}

fn skip_language_tag(text: &str) -> &str {
    text.trim_start_matches(|c: char| c.is_ascii_alphanumeric())
}

/// Parses a raw model reply into a validated [`EnrichmentResponse`].
pub fn parse_enrichment(raw: &str) -> Result<EnrichmentResponse, ShapeError> {
    let payload = strip_code_fences(raw);
    let response: EnrichmentResponse =
        serde_json::from_str(payload).map_err(|e| match e.classify() {
            Category::Data => ShapeError::Schema(e),
            Category::Syntax | Category::Eof | Category::Io => ShapeError::NotJson(e),
        })?;
    validate(response)
}

fn validate(response: EnrichmentResponse) -> Result<EnrichmentResponse, ShapeError> {
    if response.examples.len() != EXAMPLE_COUNT {
        return Err(ShapeError::WrongExampleCount {
            found: response.examples.len(),
        });
    }
    if response.corrected_german.trim().is_empty() {
        return Err(ShapeError::BlankField("correctedGerman".into()));
    }
    if response.english_translation.trim().is_empty() {
        return Err(ShapeError::BlankField("englishTranslation".into()));
    }
    for (i, example) in response.examples.iter().enumerate() {
        if example.german.trim().is_empty() {
            return Err(ShapeError::BlankField(format!("examples[{i}].german")));
        }
        if example.english.trim().is_empty() {
            return Err(ShapeError::BlankField(format!("examples[{i}].english")));
        }
    }
    Ok(response)
}
