//! Shared test helpers for the agent crate's unit tests.

use codecouncil_core::error::ProviderError;
use codecouncil_core::provider::{GenerationRequest, GenerationResponse, Provider, Usage};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

type Reply = Result<Option<String>, ProviderError>;

/// A provider that plays back scripted replies in order.
///
/// Once the script runs out, `repeat` (if set) answers every further call;
/// otherwise the call fails with `NotConfigured`.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Reply>>,
    repeat: Option<Reply>,
    requests: Mutex<Vec<GenerationRequest>>,
    fallback_credential: bool,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Reply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
            fallback_credential: false,
            delay: None,
        }
    }

    pub fn replies(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(Some(t.to_string()))).collect())
    }

    /// Answers every call with `text`.
    pub fn always(text: &str) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.repeat = Some(Ok(Some(text.to_string())));
        provider
    }

    /// Fails every call with an API error carrying `message`.
    pub fn failing(message: &str) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.repeat = Some(Err(ProviderError::ApiError {
            status_code: 500,
            message: message.to_string(),
        }));
        provider
    }

    pub fn with_fallback_credential(mut self) -> Self {
        self.fallback_credential = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn has_fallback_credential(&self) -> bool {
        self.fallback_credential
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        let reply = match (next, &self.repeat) {
            (Some(reply), _) => reply,
            (None, Some(repeat)) => repeat.clone(),
            (None, None) => Err(ProviderError::NotConfigured("script exhausted".into())),
        };

        reply.map(|text| GenerationResponse {
            text,
            model,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        })
    }
}
