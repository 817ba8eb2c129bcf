/// The public request and response shapes of the enrichment endpoint.
use serde::{Deserialize, Serialize};

/// The number of example sentence pairs every response carries.
pub const EXAMPLE_COUNT: usize = 3;

/// The inbound body. Only `word` is read; anything else in the body is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    pub word: String,
}

/// One German sentence using the word, with its English translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamplePair {
    pub german: String,
    pub english: String,
}

/// The normalized reply returned to callers.
///
/// Values of this type only leave the normalizer once they have been validated, so a
/// serialized `EnrichmentResponse` always holds non-blank strings and exactly
/// [`EXAMPLE_COUNT`] examples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentResponse {
    pub corrected_german: String,
    pub english_translation: String,
    pub examples: Vec<ExamplePair>,
}

/// The error body of every non-200 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
