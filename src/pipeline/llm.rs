//! The model call, with retry and backoff.
//!
//! Prompt construction lives in [`crate::prompts`]; this module only decides
//! whether and when to try again.
//!
//! ## Retry Strategy
//!
//! Only [`LlmError::QuotaExceeded`] and [`LlmError::TransientError`] are
//! retried. Auth and unclassified failures are returned on the first
//! attempt. The wait before attempt `n` is `backoff_ms * 2^(n-2)`, capped at
//! `max_backoff_ms`; a server-sent `Retry-After` replaces the computed wait
//! when it is longer. With the defaults (1 s base, 3 retries) the sequence
//! is 1 s → 2 s → 4 s.
//!
//! Sleeps go through [`RunContext::run`] so cancellation and the run
//! deadline interrupt a backoff as well as an in-flight request.

use crate::client::LlmClient;
use crate::config::AnalysisConfig;
use crate::error::{GuardError, LlmError};
use crate::pipeline::control::RunContext;
use crate::progress::AnalysisProgressCallback;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_ms: 1000,
            max_backoff_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_ms: config.retry_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
        }
    }

    /// Wait before retry number `retry` (1-indexed) after `error`.
    pub fn delay_for(&self, retry: u32, error: &LlmError) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        let computed = self
            .backoff_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_backoff_ms);
        let server = error
            .retry_after_secs()
            .map(|s| s.saturating_mul(1000))
            .unwrap_or(0);
        Duration::from_millis(computed.max(server))
    }
}

/// A successful model reply.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Call `client` until it succeeds, fails permanently, or retries run out.
pub async fn generate_with_retry(
    client: &dyn LlmClient,
    prompt: &str,
    policy: RetryPolicy,
    ctx: &RunContext,
    progress: Option<&dyn AnalysisProgressCallback>,
) -> Result<Generation, GuardError> {
    let start = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        if let Some(cb) = progress {
            cb.on_request_start(attempt, client.name());
        }
        debug!("{}: attempt {} ({} prompt chars)", client.name(), attempt, prompt.chars().count());

        let err = match ctx.run(client.generate(prompt)).await? {
            Ok(text) => {
                return Ok(Generation {
                    text,
                    attempts: attempt,
                    duration_ms: start.elapsed().as_millis() as u64,
                });
            }
            Err(e) => e,
        };

        let retries_used = attempt - 1;
        if !err.is_retryable() || retries_used >= policy.max_retries {
            warn!(
                "{}: giving up after {} attempt(s): {}",
                client.name(),
                attempt,
                err
            );
            return Err(GuardError::Llm {
                source: err,
                attempts: attempt,
            });
        }

        let delay = policy.delay_for(attempt, &err);
        warn!(
            "{}: attempt {} failed ({}); retry {}/{} in {}ms",
            client.name(),
            attempt,
            err,
            attempt,
            policy.max_retries,
            delay.as_millis()
        );
        if let Some(cb) = progress {
            cb.on_retry_scheduled(attempt, delay, &err.to_string());
        }
        ctx.run(tokio::time::sleep(delay)).await?;
    }
}
