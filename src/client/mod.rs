//! The LLM boundary: one operation, `generate(prompt) -> text`.
//!
//! The pipeline never talks to a vendor SDK directly. It holds an
//! `Arc<dyn LlmClient>` and branches on [`LlmError`] kinds, so swapping
//! Gemini for OpenAI or a scripted test double changes nothing downstream.
//!
//! Two implementations ship with the crate:
//!
//! * [`GeminiClient`] — speaks the Generative Language REST API over
//!   `reqwest` and classifies failures from the HTTP status.
//! * [`ProviderClient`] — wraps any `edgequake_llm::LLMProvider`
//!   (OpenAI, Anthropic, Ollama, Azure, …).

pub mod gemini;
pub mod provider;

pub use gemini::GeminiClient;
pub use provider::ProviderClient;

use crate::config::AnalysisConfig;
use crate::error::{GuardError, LlmError};
use async_trait::async_trait;
use edgequake_llm::ProviderFactory;
use std::sync::Arc;
use tracing::debug;

/// Anything that can turn a prompt into free text.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Short provider name for logs and error messages.
    fn name(&self) -> &str;

    /// Send one prompt and return the raw reply.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Resolve the LLM client, from most-specific to least-specific.
///
/// 1. **Pre-built client** (`config.client`) — used as-is. Tests and servers
///    with their own middleware go through here.
/// 2. **Named provider** (`config.provider_name`) — `"gemini"` builds a
///    [`GeminiClient`]; any other name goes through
///    [`ProviderFactory::create_llm_provider`] with the first configured model.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **Gemini key** — `config.api_key`, `GEMINI_KEY` or `GEMINI_API_KEY`.
/// 5. **Full auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_client(config: &AnalysisConfig) -> Result<Arc<dyn LlmClient>, GuardError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }

    if let Some(ref name) = config.provider_name {
        debug!("Using named provider '{}'", name);
        return named_client(name, config.models.first().map(String::as_str), config);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return named_client(&prov, Some(model.as_str()), config);
        }
    }

    if gemini::api_key_from(config).is_some() {
        return Ok(Arc::new(GeminiClient::from_config(config)?));
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| GuardError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(Arc::new(ProviderClient::new("auto", llm_provider, config)))
}

fn named_client(
    name: &str,
    model: Option<&str>,
    config: &AnalysisConfig,
) -> Result<Arc<dyn LlmClient>, GuardError> {
    if name.eq_ignore_ascii_case("gemini") || name.eq_ignore_ascii_case("google") {
        let mut config = config.clone();
        if let Some(m) = model {
            if !config.models.iter().any(|existing| existing == m) {
                config.models.insert(0, m.to_string());
            }
        }
        return Ok(Arc::new(GeminiClient::from_config(&config)?));
    }

    let model = model.unwrap_or("gpt-4.1-nano");
    let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        GuardError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(ProviderClient::new(name, provider, config)))
}
