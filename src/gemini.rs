//! The upstream generative language API (Gemini `generateContent`).
//!
//! Only the subset of the wire format this relay needs is modelled. Unknown fields in
//! upstream replies are ignored.
use crate::client::HttpClient;
use crate::errors::EnrichError;
use crate::normalize::ShapeError;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro-latest";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the API key. The key never goes into the URL, which ends up in logs.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Upstream replies larger than this are treated as transport failures.
const MAX_UPSTREAM_BODY: usize = 4 * 1024 * 1024;

/// Everything needed to reach the upstream. Built once at startup and shared by all requests.
#[derive(Clone, Builder)]
pub struct UpstreamConfig {
    pub base_url: Url,
    #[builder(into, default = DEFAULT_MODEL.to_string())]
    pub model: String,
    #[builder(into)]
    pub api_key: Option<String>,
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl UpstreamConfig {
    /// The configured key, if one is present and not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.trim().is_empty())
    }

    /// `{base_url}/models/{model}:generateContent`
    pub fn endpoint(&self) -> Result<Url, url::ParseError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(&format!("models/{}:generateContent", self.model))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl GenerateContentRequest {
    /// A single user turn holding `prompt`, asking for a JSON reply.
    pub fn from_prompt(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
            }),
        }
    }
}

impl GenerateContentResponse {
    /// The text of the first candidate, with all of its text parts joined.
    pub fn first_candidate_text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.trim().is_empty() { None } else { Some(text) }
    }
}

/// Sends `prompt` upstream and returns the raw text of the first candidate.
///
/// This is a single attempt bounded by [`UpstreamConfig::timeout`]; nothing is retried.
pub async fn generate_content<T: HttpClient>(
    client: &T,
    upstream: &UpstreamConfig,
    api_key: &str,
    prompt: &str,
) -> Result<String, EnrichError> {
    let endpoint = upstream.endpoint().map_err(|e| {
        error!(error = %e, model = %upstream.model, "Failed to build upstream endpoint");
        EnrichError::Configuration("upstream endpoint is invalid")
    })?;

    let body = serde_json::to_vec(&GenerateContentRequest::from_prompt(prompt)).map_err(|e| {
        error!(error = %e, "Failed to serialize upstream request");
        EnrichError::Configuration("upstream request could not be encoded")
    })?;

    let request = Request::builder()
        .method(Method::POST)
        .uri(endpoint.as_str())
        .header(header::CONTENT_TYPE, "application/json")
        .header(API_KEY_HEADER, api_key)
        .body(Body::from(body))
        .map_err(|_| {
            // The error may echo the header value, so it is not logged.
            error!("Failed to build upstream request, the API key is not a valid header value");
            EnrichError::Configuration("API key is not a valid header value")
        })?;

    debug!(url = %endpoint, prompt_len = prompt.len(), "Sending request to upstream");

    let exchange = async {
        let response = client.request(request).await.map_err(|e| {
            error!(error = %e, url = %endpoint, "Upstream request failed");
            EnrichError::UpstreamTransport(e.to_string())
        })?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), MAX_UPSTREAM_BODY)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to read upstream response body");
                EnrichError::UpstreamTransport(e.to_string())
            })?;
        Ok::<_, EnrichError>((status, bytes))
    };

    let (status, bytes) = match tokio::time::timeout(upstream.timeout, exchange).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(timeout = ?upstream.timeout, url = %endpoint, "Upstream request timed out");
            return Err(EnrichError::UpstreamTimeout(upstream.timeout));
        }
    };

    if !status.is_success() {
        error!(
            status = %status,
            body = %String::from_utf8_lossy(&bytes),
            "Upstream returned an error status"
        );
        return Err(EnrichError::UpstreamStatus(status));
    }

    let reply: GenerateContentResponse = serde_json::from_slice(&bytes).map_err(|e| {
        error!(error = %e, body = %String::from_utf8_lossy(&bytes), "Failed to decode upstream reply");
        ShapeError::Envelope(e)
    })?;

    reply.first_candidate_text().ok_or_else(|| {
        let finish_reason = reply
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref());
        let block_reason = reply
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref());
        error!(?finish_reason, ?block_reason, "Upstream reply carried no candidate text");
        EnrichError::InvalidAiResponse(ShapeError::NoCandidateText)
    })
}

/// Upstream server errors are passed through, everything else becomes a bad gateway.
pub(crate) fn surfaced_status(upstream: StatusCode) -> StatusCode {
    if upstream.is_server_error() {
        upstream
    } else {
        StatusCode::BAD_GATEWAY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockHttpClient;
    use serde_json::json;

    fn upstream(base: &str) -> UpstreamConfig {
        UpstreamConfig::builder()
            .base_url(base.parse().unwrap())
            .api_key("test-key")
            .build()
    }

    fn reply_with_text(text: &str) -> String {
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        })
        .to_string()
    }

    #[test]
    fn test_endpoint_with_and_without_trailing_slash() {
        let expected =
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro-latest:generateContent";
        assert_eq!(upstream(DEFAULT_BASE_URL).endpoint().unwrap().as_str(), expected);
        assert_eq!(
            upstream("https://generativelanguage.googleapis.com/v1beta")
                .endpoint()
                .unwrap()
                .as_str(),
            expected
        );
    }

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        let config = UpstreamConfig::builder()
            .base_url(DEFAULT_BASE_URL.parse().unwrap())
            .api_key("   ")
            .build();
        assert!(config.api_key().is_none());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let rendered = format!("{:?}", upstream(DEFAULT_BASE_URL));
        assert!(!rendered.contains("test-key"));
    }

    #[test]
    fn test_request_wire_format() {
        let value = serde_json::to_value(GenerateContentRequest::from_prompt("hallo")).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [{"role": "user", "parts": [{"text": "hallo"}]}],
                "generationConfig": {"responseMimeType": "application/json"}
            })
        );
    }

    #[test]
    fn test_first_candidate_text_joins_parts() {
        let reply: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}],
            "usageMetadata": {"totalTokenCount": 12}
        }))
        .unwrap();
        assert_eq!(reply.first_candidate_text().as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_first_candidate_text_missing() {
        let reply: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        assert!(reply.first_candidate_text().is_none());
    }

    #[tokio::test]
    async fn test_generate_content_sends_key_in_header() {
        let client = MockHttpClient::new(StatusCode::OK, &reply_with_text("hello"));
        let text = generate_content(&client, &upstream(DEFAULT_BASE_URL), "test-key", "prompt")
            .await
            .unwrap();
        assert_eq!(text, "hello");

        let requests = client.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert!(requests[0].uri.ends_with("/models/gemini-1.5-pro-latest:generateContent"));
        assert!(!requests[0].uri.contains("test-key"));
        assert!(
            requests[0]
                .headers
                .iter()
                .any(|(k, v)| k == API_KEY_HEADER && v == "test-key")
        );
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "prompt");
    }

    #[tokio::test]
    async fn test_generate_content_error_status() {
        let client = MockHttpClient::new(StatusCode::FORBIDDEN, r#"{"error": "denied"}"#);
        let err = generate_content(&client, &upstream(DEFAULT_BASE_URL), "test-key", "prompt")
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichError::UpstreamStatus(StatusCode::FORBIDDEN)));
    }

    #[tokio::test]
    async fn test_generate_content_undecodable_envelope() {
        let client = MockHttpClient::new(StatusCode::OK, "<html>oops</html>");
        let err = generate_content(&client, &upstream(DEFAULT_BASE_URL), "test-key", "prompt")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EnrichError::InvalidAiResponse(ShapeError::Envelope(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_content_times_out() {
        let client = MockHttpClient::new(StatusCode::OK, &reply_with_text("late"))
            .with_delay(Duration::from_millis(500));
        let config = UpstreamConfig::builder()
            .base_url(DEFAULT_BASE_URL.parse().unwrap())
            .api_key("test-key")
            .timeout(Duration::from_millis(20))
            .build();
        let err = generate_content(&client, &config, "test-key", "prompt")
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichError::UpstreamTimeout(_)));
    }

    #[test]
    fn test_surfaced_status() {
        assert_eq!(
            surfaced_status(StatusCode::SERVICE_UNAVAILABLE),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(surfaced_status(StatusCode::FORBIDDEN), StatusCode::BAD_GATEWAY);
        assert_eq!(
            surfaced_status(StatusCode::TOO_MANY_REQUESTS),
            StatusCode::BAD_GATEWAY
        );
    }
}
