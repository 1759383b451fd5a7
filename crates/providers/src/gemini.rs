//! Native Gemini provider (Generative Language REST API).
//!
//! Calls `models/{model}:generateContent` with the prompt as a single user
//! turn. When JSON output is requested the call sets
//! `responseMimeType: application/json` so the model replies with a bare
//! JSON document.

use async_trait::async_trait;
use codecouncil_core::error::ProviderError;
use codecouncil_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::http;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A Gemini provider with an optional deployment-wide credential.
///
/// The HTTP client is shared across calls; the credential is chosen per
/// request, so a caller-supplied key never rebuilds the client.
pub struct GeminiProvider {
    base_url: String,
    api_key: Option<Credential>,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: Option<Credential>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            client: http::build_client(),
        }
    }

    /// Point at a different endpoint (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_body(request: &GenerationRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user".into(),
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                response_mime_type: request.json_output.then(|| "application/json".to_string()),
            },
        }
    }

    fn extract(response: GenerateContentResponse, requested_model: &str) -> GenerationResponse {
        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            warn!(reason, "Gemini blocked the prompt");
        }

        let text: String = response
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = response.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        GenerationResponse {
            text: (!text.is_empty()).then_some(text),
            model: response
                .model_version
                .unwrap_or_else(|| requested_model.to_string()),
            usage,
        }
    }
}

/// Pull `STATUS: message` out of Gemini's `{"error": {...}}` envelope.
fn error_message(body: &str) -> Option<String> {
    let wrapper: ErrorWrapper = serde_json::from_str(body).ok()?;
    let message = wrapper.error.message?;
    Some(match wrapper.error.status {
        Some(status) if !status.is_empty() => format!("{status}: {message}"),
        _ => message,
    })
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn has_fallback_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let credential = request
            .credential_or(self.api_key.as_ref())
            .ok_or_else(|| ProviderError::MissingCredential(self.name().to_string()))?;

        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = Self::build_body(&request);

        debug!(
            model = %request.model,
            prompt_chars = request.prompt.len(),
            json_output = request.json_output,
            "Sending Gemini generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(http::transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let error_body = response.text().await.unwrap_or_default();
            return Err(http::status_error(
                self.name(),
                status,
                &headers,
                error_body,
                error_message,
            ));
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: status.as_u16(),
                message: format!("Failed to parse response: {e}"),
            })?;

        Ok(Self::extract(parsed, &request.model))
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let Some(credential) = &self.api_key else {
            return Ok(false);
        };
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .header("x-goog-api-key", credential.expose())
            .send()
            .await
            .map_err(http::transport_error)?;
        Ok(response.status().is_success())
    }
}

// --- Gemini API types (internal) ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}
