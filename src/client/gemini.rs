//! Gemini client over the Generative Language REST API.
//!
//! ## Error classification
//!
//! Failures are classified from the HTTP status, never from message text:
//!
//! | Status | Meaning | [`LlmError`] |
//! |--------|---------|--------------|
//! | 401, 403 | key rejected | `AuthError` |
//! | 400 with reason `API_KEY_INVALID` | malformed key | `AuthError` |
//! | 429 | quota / rate limit | `QuotaExceeded` (+ `Retry-After`) |
//! | 408, 500, 502, 503, 504, network, timeout | transient | `TransientError` |
//! | 404 | model not found | next model in the fallback order |
//! | anything else | | `Unknown` |
//!
//! ## Model fallback
//!
//! Models are tried in configured order. Only a 404 moves on to the next
//! model; every other failure is returned immediately so the retry policy
//! can decide what to do with it.

use super::LlmClient;
use crate::config::{AnalysisConfig, DEFAULT_GEMINI_MODELS};
use crate::error::{GuardError, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default API root.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const PROVIDER: &str = "gemini";

/// Look up the Gemini key: config first, then `GEMINI_KEY`, then `GEMINI_API_KEY`.
pub fn api_key_from(config: &AnalysisConfig) -> Option<String> {
    config
        .api_key
        .clone()
        .or_else(|| std::env::var("GEMINI_KEY").ok())
        .or_else(|| std::env::var("GEMINI_API_KEY").ok())
        .filter(|k| !k.trim().is_empty())
}

/// REST client for Gemini `generateContent`.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    models: Vec<String>,
    base_url: String,
    temperature: f32,
    max_output_tokens: usize,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("models", &self.models)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    /// Build a client from the analysis config.
    ///
    /// An empty model list falls back to [`DEFAULT_GEMINI_MODELS`].
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, GuardError> {
        let api_key = api_key_from(config).ok_or_else(|| GuardError::ProviderNotConfigured {
            provider: PROVIDER.to_string(),
            hint: "Set GEMINI_KEY (or GEMINI_API_KEY), or pass --api-key.".to_string(),
        })?;

        let models = if config.models.is_empty() {
            DEFAULT_GEMINI_MODELS.iter().map(|m| m.to_string()).collect()
        } else {
            config.models.clone()
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| GuardError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key,
            models,
            base_url: GEMINI_BASE_URL.to_string(),
            temperature: config.temperature,
            max_output_tokens: config.max_tokens,
        })
    }

    /// Point the client at another API root (proxies, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    fn request_body(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }

    /// One call against one model. `Ok(None)` means the model does not exist.
    async fn generate_with_model(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<Option<String>, LlmError> {
        let response = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status().as_u16();
        if status == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, &body));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                classify_transport(e)
            } else {
                LlmError::Unknown {
                    detail: format!("malformed Gemini response: {e}"),
                }
            }
        })?;
        response_text(parsed).map(Some)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        for model in &self.models {
            debug!("Gemini: requesting {} ({} prompt chars)", model, prompt.len());
            match self.generate_with_model(model, prompt).await? {
                Some(text) => {
                    info!("Gemini: {} answered with {} chars", model, text.len());
                    return Ok(text);
                }
                None => warn!("Gemini: model '{}' not found, trying next", model),
            }
        }
        Err(LlmError::Unknown {
            detail: format!(
                "none of the configured Gemini models are available: {}",
                self.models.join(", ")
            ),
        })
    }
}

// ── Classification ───────────────────────────────────────────────────────

/// Map a non-success, non-404 status onto the error taxonomy.
pub fn classify_status(status: u16, retry_after_secs: Option<u64>, body: &str) -> LlmError {
    let api_error = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let detail = api_error
        .as_ref()
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| format!("HTTP {status}"));

    match status {
        401 | 403 => LlmError::AuthError {
            provider: PROVIDER.to_string(),
            detail,
        },
        400 if api_error
            .as_ref()
            .is_some_and(|e| e.details.iter().any(|d| d.reason.as_deref() == Some("API_KEY_INVALID"))) =>
        {
            LlmError::AuthError {
                provider: PROVIDER.to_string(),
                detail,
            }
        }
        429 => LlmError::QuotaExceeded {
            provider: PROVIDER.to_string(),
            retry_after_secs,
        },
        408 | 500 | 502 | 503 | 504 => LlmError::TransientError {
            provider: PROVIDER.to_string(),
            detail,
        },
        _ => LlmError::Unknown {
            detail: format!("HTTP {status}: {detail}"),
        },
    }
}

fn classify_transport(e: reqwest::Error) -> LlmError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        LlmError::TransientError {
            provider: PROVIDER.to_string(),
            detail: e.to_string(),
        }
    } else {
        LlmError::Unknown {
            detail: e.to_string(),
        }
    }
}

/// Join the text parts of the first candidate.
fn response_text(resp: GenerateResponse) -> Result<String, LlmError> {
    let Some(candidate) = resp.candidates.into_iter().next() else {
        let reason = resp
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(LlmError::Unknown {
            detail: format!("Gemini returned no answer: {reason}"),
        });
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(LlmError::Unknown {
            detail: format!(
                "Gemini returned an empty answer (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ),
        });
    }
    Ok(text)
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}
