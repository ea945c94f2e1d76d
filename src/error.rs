//! Error types for the legal-guard library.
//!
//! Three tiers of failure, from most to least severe:
//!
//! * [`GuardError`] — **Fatal**: the analysis run cannot produce a report
//!   (not a PDF, provider rejected the key, quota exhausted). Returned as
//!   `Err(GuardError)` from the top-level `analyze*` functions.
//!
//! * [`ExtractionError::PageDecodeFailure`] and [`LlmError`] values that were
//!   retried away — **Recorded**: a single page could not be decoded, or a
//!   rate-limited attempt succeeded on retry. Pages are kept in
//!   [`crate::pipeline::extract::ExtractedText::failed_pages`].
//!
//! * [`crate::pipeline::parse::Diagnostic`] — **Cosmetic**: the model ignored
//!   the requested output format. Never an error; a degraded report is always
//!   returned.
//!
//! Every fatal error maps onto an [`ErrorAdvice`] so a front-end can tell
//! "wait and retry" apart from "fix your configuration" and "try another file"
//! without inspecting message text.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the legal-guard library.
#[derive(Debug, Error)]
pub enum GuardError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Contract file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// URL download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// URL download did not finish in time.
    #[error("Download of '{url}' timed out after {secs}s")]
    DownloadTimeout { url: String, secs: u64 },

    /// The document could not be turned into text.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The configured text backend could not be initialised.
    #[error("Text extraction backend '{backend}' is unavailable: {detail}")]
    BackendUnavailable { backend: String, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM call failed after the retry policy gave up.
    #[error("{source}")]
    Llm {
        #[source]
        source: LlmError,
        attempts: u32,
    },

    // ── Run control ───────────────────────────────────────────────────────
    /// The caller cancelled the run.
    #[error("Analysis cancelled")]
    Cancelled,

    /// The run's deadline passed before it finished.
    #[error("Analysis exceeded its deadline of {secs}s")]
    DeadlineExceeded { secs: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Session id is unknown to the [`crate::session::SessionStore`].
    #[error("Unknown session '{0}'")]
    SessionNotFound(String),

    /// A follow-up question was asked before any document was analysed.
    #[error("Session '{session}' has no analysed document yet; analyse a contract first.")]
    NoAnalysis { session: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// What a user can do about a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorAdvice {
    /// Provider is rate-limited or temporarily unavailable.
    RetryLater,
    /// Key, provider or option is wrong.
    FixConfiguration,
    /// The uploaded document is the problem.
    TryDifferentFile,
    /// Nothing specific; show the message.
    Other,
}

impl GuardError {
    /// Classify the error for presentation.
    pub fn advice(&self) -> ErrorAdvice {
        match self {
            GuardError::FileNotFound { .. }
            | GuardError::PermissionDenied { .. }
            | GuardError::Extraction(_)
            | GuardError::DownloadFailed { .. } => ErrorAdvice::TryDifferentFile,
            GuardError::DownloadTimeout { .. } => ErrorAdvice::RetryLater,
            GuardError::BackendUnavailable { .. }
            | GuardError::ProviderNotConfigured { .. }
            | GuardError::InvalidConfig(_) => ErrorAdvice::FixConfiguration,
            GuardError::Llm { source, .. } => source.advice(),
            GuardError::DeadlineExceeded { .. } => ErrorAdvice::RetryLater,
            GuardError::Cancelled
            | GuardError::SessionNotFound(_)
            | GuardError::NoAnalysis { .. }
            | GuardError::Internal(_) => ErrorAdvice::Other,
        }
    }

    /// The underlying LLM error, if this run failed at the provider.
    pub fn llm_error(&self) -> Option<&LlmError> {
        match self {
            GuardError::Llm { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failures turning document bytes into text.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExtractionError {
    /// The bytes are not a parseable PDF.
    #[error("File is not a valid PDF: {detail}\nTry a different file.")]
    InvalidFormat { detail: String },

    /// One page could not be decoded. Recorded, not propagated: the page
    /// contributes an empty string to the extracted text.
    #[error("Page {page_index}: text could not be decoded: {detail}")]
    PageDecodeFailure { page_index: usize, detail: String },
}

/// Failures from the LLM provider boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LlmError {
    /// 401/403 or a malformed key — retrying will not help.
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// 429 — caller should back off.
    ///
    /// `retry_after_secs` carries a server-specified delay when one was sent.
    #[error("Rate limit exceeded for provider '{provider}'")]
    QuotaExceeded {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// Timeout, connection reset, 5xx.
    #[error("Transient error from provider '{provider}': {detail}")]
    TransientError { provider: String, detail: String },

    /// Anything the client could not classify.
    #[error("LLM API error: {detail}")]
    Unknown { detail: String },
}

impl LlmError {
    /// Whether the retry policy may try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::QuotaExceeded { .. } | LlmError::TransientError { .. }
        )
    }

    pub fn advice(&self) -> ErrorAdvice {
        match self {
            LlmError::QuotaExceeded { .. } | LlmError::TransientError { .. } => {
                ErrorAdvice::RetryLater
            }
            LlmError::AuthError { .. } => ErrorAdvice::FixConfiguration,
            LlmError::Unknown { .. } => ErrorAdvice::Other,
        }
    }

    /// Server-requested delay before the next attempt, if any.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            LlmError::QuotaExceeded {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_display_names_provider() {
        let e = LlmError::QuotaExceeded {
            provider: "gemini".into(),
            retry_after_secs: Some(30),
        };
        assert!(e.to_string().contains("gemini"));
        assert_eq!(e.retry_after_secs(), Some(30));
    }

    #[test]
    fn auth_error_display() {
        let e = LlmError::AuthError {
            provider: "openai".into(),
            detail: "invalid key".into(),
        };
        assert!(e.to_string().contains("openai"));
        assert!(e.to_string().contains("invalid key"));
        assert!(!e.is_retryable());
    }

    #[test]
    fn retryable_kinds() {
        assert!(LlmError::TransientError {
            provider: "x".into(),
            detail: "503".into()
        }
        .is_retryable());
        assert!(LlmError::QuotaExceeded {
            provider: "x".into(),
            retry_after_secs: None
        }
        .is_retryable());
        assert!(!LlmError::Unknown {
            detail: "?".into()
        }
        .is_retryable());
    }

    #[test]
    fn advice_distinguishes_retry_config_and_file() {
        let quota = GuardError::Llm {
            source: LlmError::QuotaExceeded {
                provider: "gemini".into(),
                retry_after_secs: None,
            },
            attempts: 4,
        };
        assert_eq!(quota.advice(), ErrorAdvice::RetryLater);

        let auth = GuardError::Llm {
            source: LlmError::AuthError {
                provider: "gemini".into(),
                detail: "bad key".into(),
            },
            attempts: 1,
        };
        assert_eq!(auth.advice(), ErrorAdvice::FixConfiguration);

        let bad_file = GuardError::from(ExtractionError::InvalidFormat {
            detail: "missing %PDF header".into(),
        });
        assert_eq!(bad_file.advice(), ErrorAdvice::TryDifferentFile);
    }

    #[test]
    fn llm_wrapper_displays_source() {
        let e = GuardError::Llm {
            source: LlmError::Unknown {
                detail: "boom".into(),
            },
            attempts: 1,
        };
        assert_eq!(e.to_string(), "LLM API error: boom");
        assert!(e.llm_error().is_some());
    }
}
