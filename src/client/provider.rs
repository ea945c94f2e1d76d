//! Adapter from any `edgequake_llm::LLMProvider` to [`LlmClient`].
//!
//! The provider crate reports failures as opaque errors, so this is the one
//! place in the crate that classifies a failure from its message text.
//! Everything downstream sees only [`LlmError`] kinds.

use super::LlmClient;
use crate::config::AnalysisConfig;
use crate::error::LlmError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage as LlmMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use tracing::debug;

/// Wraps an `edgequake-llm` provider (OpenAI, Anthropic, Ollama, …).
pub struct ProviderClient {
    name: String,
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl ProviderClient {
    pub fn new(name: &str, provider: Arc<dyn LLMProvider>, config: &AnalysisConfig) -> Self {
        Self {
            name: name.to_string(),
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl LlmClient for ProviderClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let messages = vec![LlmMessage::user(prompt)];
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| classify_provider_message(&self.name, &e.to_string()))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.name, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

fn build_options(config: &AnalysisConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Classify a provider error message into an [`LlmError`] kind.
pub fn classify_provider_message(provider: &str, message: &str) -> LlmError {
    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["429", "rate limit", "rate_limit", "quota", "too many requests"]) {
        LlmError::QuotaExceeded {
            provider: provider.to_string(),
            retry_after_secs: None,
        }
    } else if has(&[
        "401",
        "403",
        "unauthorized",
        "forbidden",
        "invalid api key",
        "api key",
        "authentication",
    ]) {
        LlmError::AuthError {
            provider: provider.to_string(),
            detail: message.to_string(),
        }
    } else if has(&[
        "timeout",
        "timed out",
        "500",
        "502",
        "503",
        "504",
        "overloaded",
        "connection",
        "unavailable",
    ]) {
        LlmError::TransientError {
            provider: provider.to_string(),
            detail: message.to_string(),
        }
    } else {
        LlmError::Unknown {
            detail: message.to_string(),
        }
    }
}
