/// Axum handlers for the enrichment endpoint
use crate::AppState;
use crate::client::HttpClient;
use crate::errors::EnrichError;
use crate::gemini::generate_content;
use crate::models::{EnrichmentRequest, EnrichmentResponse};
use crate::normalize::parse_enrichment;
use crate::prompt::build_prompt;
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::Method,
};
use tracing::{debug, error, info, instrument, warn};

/// Validates the word, asks the upstream about it and returns the normalized reply.
///
/// Input is checked before the credential, and both before anything goes upstream.
#[instrument(skip(state, body))]
pub async fn enrich_handler<T: HttpClient + Clone + Send + Sync + 'static>(
    State(state): State<AppState<T>>,
    body: Bytes,
) -> Result<Json<EnrichmentResponse>, EnrichError> {
    let request = parse_request(&body)?;
    let word = request.word.trim();

    let Some(api_key) = state.upstream.api_key() else {
        error!("No API key configured, rejecting enrichment request");
        return Err(EnrichError::Configuration("GEMINI_API_KEY is not set"));
    };

    info!(word, "Enriching word");
    let text = generate_content(&state.http_client, &state.upstream, api_key, &build_prompt(word))
        .await?;

    let enriched = parse_enrichment(&text).map_err(|e| {
        error!(error = %e, raw = %text, "Upstream reply does not satisfy the response schema");
        e
    })?;

    debug!(corrected = %enriched.corrected_german, "Enrichment complete");
    Ok(Json(enriched))
}

/// Any method other than POST on the enrichment route.
pub async fn method_not_allowed(method: Method) -> EnrichError {
    warn!(%method, "Rejecting request with unsupported method");
    EnrichError::MethodNotAllowed(method)
}

/// The body must be a JSON object whose `word` is a string that is not blank.
fn parse_request(body: &[u8]) -> Result<EnrichmentRequest, EnrichError> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "Rejecting request body that is not JSON");
        EnrichError::InvalidInput(e.to_string())
    })?;
    if !value.is_object() {
        warn!("Rejecting request body that is not a JSON object");
        return Err(EnrichError::InvalidInput("body must be a JSON object".into()));
    }
    let request: EnrichmentRequest = serde_json::from_value(value).map_err(|e| {
        warn!(error = %e, "Rejecting request without a string `word`");
        EnrichError::InvalidInput(e.to_string())
    })?;
    if request.word.trim().is_empty() {
        warn!("Rejecting blank word");
        return Err(EnrichError::InvalidInput("`word` must not be blank".into()));
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_accepts_extra_fields() {
        let request = parse_request(br#"{"word": "Hund", "lang": "de"}"#).unwrap();
        assert_eq!(request.word, "Hund");
    }

    #[test]
    fn test_parse_request_rejections() {
        let bodies: [&[u8]; 9] = [
            b"",
            b"not json",
            b"[\"Hund\"]",
            b"{}",
            b"{\"word\": null}",
            b"{\"word\": 42}",
            b"{\"word\": [\"Hund\"]}",
            b"{\"word\": \"\"}",
            b"{\"word\": \" \\t\\n \"}",
        ];
        for body in bodies {
            assert!(
                matches!(parse_request(body), Err(EnrichError::InvalidInput(_))),
                "body {:?} should be rejected",
                String::from_utf8_lossy(body)
            );
        }
    }
}
