//! Provider trait — the abstraction over model-generation backends.
//!
//! A Provider accepts a single prompt and returns generated text. The agent
//! loop talks to it through the model client adapter without knowing which
//! backend is in use.
//!
//! Implementations: Gemini (native), OpenAI-compatible endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// An API credential for a generation provider.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw key. Blank keys are treated as absent.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The raw key, for building request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// One generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The model to use (e.g., "gemini-2.5-flash")
    pub model: String,

    /// The full prompt text
    pub prompt: String,

    /// Sampling temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// Ask the provider to return a JSON-formatted string
    pub json_output: bool,

    /// Per-call credential; takes precedence over the provider's own
    pub credential: Option<Credential>,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature: 0.1,
            max_tokens: None,
            json_output: false,
            credential: None,
        }
    }

    /// Pick the credential for this call: the request's own, else `fallback`.
    pub fn credential_or<'a>(&'a self, fallback: Option<&'a Credential>) -> Option<&'a Credential> {
        self.credential.as_ref().or(fallback)
    }
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Generated text, if the provider returned any
    pub text: Option<String>,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Token usage statistics
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// Every backend implements this trait. Failures of any kind (network,
/// authentication, quota) are reported as [`ProviderError`]; callers treat
/// them uniformly.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini").
    fn name(&self) -> &str;

    /// Whether the provider holds a deployment-wide credential of its own.
    fn has_fallback_credential(&self) -> bool {
        false
    }

    /// Send a request and get a complete response.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError>;

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}
