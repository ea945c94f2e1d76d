//! Result types returned by the analysis entry points.

use crate::error::ExtractionError;
use crate::pipeline::classify::RiskTier;
use crate::pipeline::parse::Diagnostic;
use serde::{Deserialize, Serialize};

/// Everything one analysis run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub tier: RiskTier,
    /// 1–10, after clamping/defaulting.
    pub score: u8,
    /// The model's reply, unmodified.
    pub body: String,
    pub summary: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub extraction: ExtractionStats,
    pub request: RequestStats,
    /// The prefix of the contract that was actually sent. Follow-up
    /// questions reuse it as context.
    pub document_excerpt: String,
    pub target_language: String,
}

impl AnalysisOutput {
    /// Whether the score came from the reply rather than the default.
    pub fn score_found(&self) -> bool {
        !self.diagnostics.contains(&Diagnostic::ScoreNotFound)
    }
}

/// What the extraction stage saw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub page_count: usize,
    /// Pages that contributed empty text.
    pub failed_pages: Vec<ExtractionError>,
    /// Characters extracted, before truncation.
    pub extracted_chars: usize,
    /// Characters embedded in the prompt.
    pub sent_chars: usize,
    pub truncated: bool,
}

/// How the model call went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStats {
    /// Name of the [`crate::client::LlmClient`] that answered.
    pub client: String,
    pub attempts: u32,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}
