//! # legal-guard
//!
//! Scan a PDF contract for predatory clauses with an LLM and turn its
//! free-text verdict into a structured, classified risk report.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     read a local file or download a URL into memory
//!  ├─ 2. Extract   page text in page order (lopdf, spawn_blocking)
//!  ├─ 3. Prompt    truncate to the character budget, embed the output protocol
//!  ├─ 4. LLM       Gemini / OpenAI / Anthropic / … with retry and backoff
//!  ├─ 5. Parse     RISK SCORE line + SUMMARY section, never fails
//!  └─ 6. Classify  LOW / MODERATE / HIGH
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use legal_guard::{analyze, AnalysisConfig, RiskTier};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Gemini from GEMINI_KEY, or any provider edgequake-llm detects.
//!     let config = AnalysisConfig::default();
//!     let output = analyze("rental-agreement.pdf", &config).await?;
//!     if output.tier == RiskTier::High {
//!         eprintln!("Do not sign without advice.");
//!     }
//!     println!("{}", output.body);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `legal-guard` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `pdfium` | off     | Adds the pdfium text backend; needs libpdfium at runtime |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! legal-guard = { version = "0.3", default-features = false }
//! ```
//!
//! ## What the model sees
//!
//! Only the first `character_budget` characters (default 8000) of the
//! extracted text are sent. Clauses beyond that are never analysed;
//! [`ExtractionStats::truncated`] tells the caller when this happened.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod client;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{
    analyze, analyze_bytes, analyze_bytes_with, analyze_in_session, analyze_sync, ask_follow_up,
    ask_in_session, report_from_response,
};
pub use client::{resolve_client, GeminiClient, LlmClient, ProviderClient};
pub use config::{
    AnalysisConfig, AnalysisConfigBuilder, ExtractionBackend, HighlightStyle,
    DEFAULT_CHARACTER_BUDGET, DEFAULT_GEMINI_MODELS, SUPPORTED_LANGUAGES,
};
pub use error::{ErrorAdvice, ExtractionError, GuardError, LlmError};
pub use output::{AnalysisOutput, ExtractionStats, RequestStats};
pub use pipeline::classify::{classify, RiskThresholds, RiskTier};
pub use pipeline::control::{CancelHandle, RunContext};
pub use pipeline::extract::ExtractedText;
pub use pipeline::parse::{parse_report, Diagnostic, Report};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::{build_analysis_request, AnalysisRequest, PromptOptions};
pub use session::{ChatMessage, Role, Session, SessionStore};
