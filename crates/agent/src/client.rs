//! Model client adapter — one JSON-mode generation call per loop iteration.

use codecouncil_core::error::ProviderError;
use codecouncil_core::provider::{Credential, GenerationRequest, Provider};
use std::sync::Arc;
use tracing::debug;

/// Sampling temperature used when none is configured.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Returned in place of an empty provider reply.
pub const EMPTY_REPLY: &str = "{}";

/// Wraps a provider with the fixed generation settings the loop uses.
///
/// The provider is shared between sessions; per-call credentials travel in
/// the request, so nothing here is rebuilt per session.
#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ModelClient {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether a call made with `explicit` would carry a credential.
    pub fn can_authenticate(&self, explicit: Option<&Credential>) -> bool {
        explicit.is_some() || self.provider.has_fallback_credential()
    }

    /// Request a JSON reply for `prompt`. An empty reply becomes `"{}"`.
    pub async fn generate(
        &self,
        prompt: &str,
        credential: Option<&Credential>,
    ) -> Result<String, ProviderError> {
        let mut request = GenerationRequest::new(self.model.clone(), prompt);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request.json_output = true;
        request.credential = credential.cloned();

        let response = self.provider.generate(request).await?;

        if let Some(usage) = &response.usage {
            debug!(
                provider = self.provider.name(),
                model = %response.model,
                total_tokens = usage.total_tokens,
                "Model call finished"
            );
        }

        Ok(response
            .text
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| EMPTY_REPLY.to_string()))
    }
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClient")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
