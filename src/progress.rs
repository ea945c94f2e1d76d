//! Progress-callback trait for per-stage analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves from extraction to the model call to the
//! parsed report. The CLI drives its spinner from these; a server could
//! forward them over a WebSocket instead.
//!
//! # Example
//!
//! ```rust
//! use legal_guard::{AnalysisConfig, AnalysisProgressCallback, RiskTier};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl AnalysisProgressCallback for Printer {
//!     fn on_report_ready(&self, tier: RiskTier, score: u8) {
//!         eprintln!("{tier:?} ({score}/10)");
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::classify::RiskTier;
use std::sync::Arc;
use std::time::Duration;

/// Called by the analysis pipeline as each stage finishes.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Text has been pulled out of the document.
    ///
    /// # Arguments
    /// * `total_pages`  — pages in the document
    /// * `failed_pages` — pages that contributed empty text
    /// * `chars`        — characters extracted before truncation
    fn on_extraction_complete(&self, total_pages: usize, failed_pages: usize, chars: usize) {
        let _ = (total_pages, failed_pages, chars);
    }

    /// A request is about to be sent.
    ///
    /// # Arguments
    /// * `attempt` — 1-indexed attempt number
    /// * `client`  — name of the LLM client
    fn on_request_start(&self, attempt: u32, client: &str) {
        let _ = (attempt, client);
    }

    /// A retryable failure occurred; the pipeline will sleep for `delay`.
    fn on_retry_scheduled(&self, attempt: u32, delay: Duration, error: &str) {
        let _ = (attempt, delay, error);
    }

    /// The response was parsed and classified.
    fn on_report_ready(&self, tier: RiskTier, score: u8) {
        let _ = (tier, score);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
