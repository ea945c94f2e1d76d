//! Configuration types for contract risk analysis.
//!
//! All analysis behaviour is controlled through [`AnalysisConfig`], built via
//! its [`AnalysisConfigBuilder`]. Setters clamp obviously-wrong values;
//! [`AnalysisConfigBuilder::build`] rejects combinations that cannot be
//! clamped into something meaningful (zero budget, inverted thresholds).

use crate::client::LlmClient;
use crate::error::GuardError;
use crate::pipeline::classify::RiskThresholds;
use crate::progress::ProgressCallback;
use crate::prompts::PromptOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Number of document characters sent to the model by default.
///
/// Only this prefix of a long contract is ever analysed; clauses past the
/// budget are invisible to the model.
pub const DEFAULT_CHARACTER_BUDGET: usize = 8000;

/// Gemini models tried in order. The next one is used only when the previous
/// answers "model not found".
pub const DEFAULT_GEMINI_MODELS: &[&str] = &[
    "gemini-2.0-flash",
    "gemini-1.5-flash-latest",
    "gemini-1.5-flash",
];

/// Report languages offered by the front-ends. The name is inserted verbatim
/// into the prompt.
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "English",
    "Spanish",
    "French",
    "German",
    "Portuguese",
    "Italian",
    "Hindi",
    "Urdu",
    "Arabic",
    "Chinese",
    "Japanese",
];

/// Configuration for one analysis run.
///
/// # Example
/// ```rust
/// use legal_guard::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .target_language("Spanish")
///     .character_budget(12_000)
///     .max_retries(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.character_budget, 12_000);
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Natural-language name of the report language. Default: "English".
    pub target_language: String,

    /// Maximum number of document characters embedded in the prompt. Default: 8000.
    pub character_budget: usize,

    /// Whether the model is asked to bold dangerous or legal terms. Default: inline markup.
    pub highlight_style: HighlightStyle,

    /// Score cut-offs for the risk tiers. Default: MODERATE from 4, HIGH from 7.
    pub thresholds: RiskThresholds,

    /// Model ids in fallback order. Empty means the provider default.
    pub models: Vec<String>,

    /// LLM provider name ("gemini", "openai", "anthropic", "ollama", …).
    /// If None, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed client. Takes precedence over `provider_name`.
    pub client: Option<Arc<dyn LlmClient>>,

    /// API credential. Falls back to `GEMINI_KEY` / `GEMINI_API_KEY` for Gemini.
    pub api_key: Option<String>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 2048.
    pub max_tokens: usize,

    /// Retries after a rate-limited or transient failure. Default: 3.
    pub max_retries: u32,

    /// Initial backoff in milliseconds, doubled after every attempt. Default: 1000.
    pub retry_backoff_ms: u64,

    /// Upper bound on a single backoff sleep, in milliseconds. Default: 30 000.
    pub max_backoff_ms: u64,

    /// Per-request HTTP timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Whole-run deadline in seconds. Default: None.
    pub deadline_secs: Option<u64>,

    /// Which library turns PDF bytes into text. Default: lopdf.
    pub backend: ExtractionBackend,

    /// Optional per-stage progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target_language: "English".to_string(),
            character_budget: DEFAULT_CHARACTER_BUDGET,
            highlight_style: HighlightStyle::default(),
            thresholds: RiskThresholds::default(),
            models: Vec::new(),
            provider_name: None,
            client: None,
            api_key: None,
            temperature: 0.2,
            max_tokens: 2048,
            max_retries: 3,
            retry_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            api_timeout_secs: 60,
            deadline_secs: None,
            backend: ExtractionBackend::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("target_language", &self.target_language)
            .field("character_budget", &self.character_budget)
            .field("highlight_style", &self.highlight_style)
            .field("thresholds", &self.thresholds)
            .field("models", &self.models)
            .field("provider_name", &self.provider_name)
            .field("client", &self.client.as_ref().map(|c| c.name().to_string()))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("max_backoff_ms", &self.max_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("deadline_secs", &self.deadline_secs)
            .field("backend", &self.backend)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AnalysisProgressCallback>"),
            )
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// The subset of the config the prompt builder reads.
    pub fn prompt_options(&self) -> PromptOptions {
        PromptOptions {
            target_language: self.target_language.clone(),
            character_budget: self.character_budget,
            highlight_style: self.highlight_style,
        }
    }
}

/// Builder for [`AnalysisConfig`].
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl fmt::Debug for AnalysisConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl AnalysisConfigBuilder {
    pub fn target_language(mut self, language: impl Into<String>) -> Self {
        self.config.target_language = language.into();
        self
    }

    pub fn character_budget(mut self, chars: usize) -> Self {
        self.config.character_budget = chars;
        self
    }

    pub fn highlight_style(mut self, style: HighlightStyle) -> Self {
        self.config.highlight_style = style;
        self
    }

    pub fn thresholds(mut self, thresholds: RiskThresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    /// Append a model to the fallback order.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.models.push(model.into());
        self
    }

    /// Replace the whole fallback order.
    pub fn models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.config.max_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn deadline_secs(mut self, secs: u64) -> Self {
        self.config.deadline_secs = Some(secs);
        self
    }

    pub fn backend(mut self, backend: ExtractionBackend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, GuardError> {
        let c = &self.config;
        if c.character_budget == 0 {
            return Err(GuardError::InvalidConfig(
                "Character budget must be ≥ 1".into(),
            ));
        }
        if c.target_language.trim().is_empty() {
            return Err(GuardError::InvalidConfig(
                "Target language must not be empty".into(),
            ));
        }
        c.thresholds.validate()?;
        if c.models.iter().any(|m| m.trim().is_empty()) {
            return Err(GuardError::InvalidConfig(
                "Model ids must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Whether the prompt asks for inline emphasis of risky terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HighlightStyle {
    /// Plain prose.
    None,
    /// `**bold**` around dangerous or legal terms. (default)
    #[default]
    InlineMarkup,
}

/// Text extraction library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionBackend {
    /// Pure-Rust, in-memory parsing via `lopdf`. (default)
    #[default]
    Lopdf,
    /// pdfium via `pdfium-render`; requires the `pdfium` feature and libpdfium.
    Pdfium,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_observed_configuration() {
        let c = AnalysisConfig::default();
        assert_eq!(c.character_budget, 8000);
        assert_eq!(c.target_language, "English");
        assert_eq!(c.thresholds, RiskThresholds::default());
        assert!(c.models.is_empty());
    }

    #[test]
    fn zero_budget_is_rejected() {
        let err = AnalysisConfig::builder()
            .character_budget(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, GuardError::InvalidConfig(_)));
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let err = AnalysisConfig::builder()
            .thresholds(RiskThresholds {
                moderate_min: 8,
                high_min: 5,
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("threshold"), "got: {err}");
    }

    #[test]
    fn models_keep_fallback_order() {
        let c = AnalysisConfig::builder()
            .model("a")
            .model("b")
            .build()
            .unwrap();
        assert_eq!(c.models, vec!["a", "b"]);

        let c = AnalysisConfig::builder().models(["x", "y", "z"]).build().unwrap();
        assert_eq!(c.models, vec!["x", "y", "z"]);
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = AnalysisConfig::builder()
            .api_key("super-secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn debug_lists_backoff_cap() {
        let c = AnalysisConfig::builder().max_backoff_ms(1234).build().unwrap();
        assert!(format!("{c:?}").contains("max_backoff_ms: 1234"));
    }

    #[test]
    fn temperature_is_clamped() {
        let c = AnalysisConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn prompt_options_mirror_config() {
        let c = AnalysisConfig::builder()
            .target_language("French")
            .character_budget(100)
            .highlight_style(HighlightStyle::None)
            .build()
            .unwrap();
        let opts = c.prompt_options();
        assert_eq!(opts.target_language, "French");
        assert_eq!(opts.character_budget, 100);
        assert_eq!(opts.highlight_style, HighlightStyle::None);
    }
}
