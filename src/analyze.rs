//! Analysis entry points: one document in, one classified report out.
//!
//! [`analyze`] is the simple path (path or URL, provider resolved from the
//! config). [`analyze_bytes_with`] takes an explicit client and
//! [`RunContext`] and is what servers and tests use. Follow-up questions go
//! through [`ask_follow_up`], which answers against the analysis stored in a
//! [`Session`].

use crate::client::{resolve_client, LlmClient};
use crate::config::AnalysisConfig;
use crate::error::GuardError;
use crate::output::{AnalysisOutput, ExtractionStats, RequestStats};
use crate::pipeline::classify::{RiskThresholds, RiskTier};
use crate::pipeline::control::RunContext;
use crate::pipeline::llm::{generate_with_retry, RetryPolicy};
use crate::pipeline::parse::{parse_report, Report};
use crate::pipeline::{extract, input};
use crate::prompts::{build_analysis_request, build_follow_up_prompt};
use crate::session::{ChatMessage, Session, SessionStore};
use std::time::Instant;
use tracing::{debug, info};

/// Analyse a contract given as a local path or an HTTP(S) URL.
///
/// # Errors
/// Returns `Err(GuardError)` only when no report can be produced: the file is
/// missing or not a PDF, no provider is configured, the provider failed after
/// retries, or the run deadline passed. A reply that ignores the output
/// format is not an error; see [`AnalysisOutput::diagnostics`].
///
/// # Example
/// ```rust,no_run
/// use legal_guard::{analyze, AnalysisConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Gemini is picked up from GEMINI_KEY; other providers from their usual env vars.
/// let config = AnalysisConfig::builder().target_language("Spanish").build()?;
/// let output = analyze("lease.pdf", &config).await?;
/// println!("{} ({}/10)\n{}", output.tier, output.score, output.body);
/// # Ok(())
/// # }
/// ```
pub async fn analyze(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, GuardError> {
    let input_str = input_str.as_ref();
    info!("Starting analysis: {}", input_str);

    let ctx = RunContext::unbounded().with_optional_deadline(config.deadline_secs);
    let bytes = ctx
        .run(input::load_document(input_str, config.api_timeout_secs))
        .await??;
    let client = resolve_client(config)?;
    analyze_bytes_with(bytes, config, client.as_ref(), &ctx).await
}

/// Analyse PDF bytes already in memory.
pub async fn analyze_bytes(
    bytes: Vec<u8>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, GuardError> {
    let client = resolve_client(config)?;
    let ctx = RunContext::unbounded().with_optional_deadline(config.deadline_secs);
    analyze_bytes_with(bytes, config, client.as_ref(), &ctx).await
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, GuardError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| GuardError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(input_str, config))
}

/// The full pipeline with an explicit client and run context.
pub async fn analyze_bytes_with(
    bytes: Vec<u8>,
    config: &AnalysisConfig,
    client: &dyn LlmClient,
    ctx: &RunContext,
) -> Result<AnalysisOutput, GuardError> {
    let total_start = Instant::now();
    let progress = config.progress_callback.as_deref();

    // ── Step 1: Extract text ─────────────────────────────────────────────
    let extracted = ctx
        .run(extract::extract_text(bytes, config.backend))
        .await??;
    if let Some(cb) = progress {
        cb.on_extraction_complete(
            extracted.page_count,
            extracted.failed_page_count(),
            extracted.char_count(),
        );
    }

    // ── Step 2: Build the prompt ─────────────────────────────────────────
    let request = build_analysis_request(&extracted.text, &config.prompt_options());
    if request.truncated() {
        info!(
            "Document truncated to {} of {} chars ({} dropped)",
            request.sent_chars,
            request.document_chars,
            request.dropped_chars()
        );
    }
    debug!("Prompt is {} chars", request.prompt.chars().count());

    // ── Step 3: Call the model ───────────────────────────────────────────
    let generation = generate_with_retry(
        client,
        &request.prompt,
        RetryPolicy::from_config(config),
        ctx,
        progress,
    )
    .await?;

    // ── Step 4: Parse and classify ───────────────────────────────────────
    let (report, tier) = report_from_response(&generation.text, &config.thresholds);
    if let Some(cb) = progress {
        cb.on_report_ready(tier, report.score);
    }

    let total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Analysis complete: {} ({}/10) via {} in {}ms",
        tier,
        report.score,
        client.name(),
        total_duration_ms
    );

    Ok(AnalysisOutput {
        tier,
        score: report.score,
        body: report.body,
        summary: report.summary,
        diagnostics: report.diagnostics,
        extraction: ExtractionStats {
            page_count: extracted.page_count,
            failed_pages: extracted.failed_pages,
            extracted_chars: request.document_chars,
            sent_chars: request.sent_chars,
            truncated: request.truncated(),
        },
        request: RequestStats {
            client: client.name().to_string(),
            attempts: generation.attempts,
            llm_duration_ms: generation.duration_ms,
            total_duration_ms,
        },
        document_excerpt: request.document_excerpt,
        target_language: request.target_language,
    })
}

/// Parse a raw reply and classify its score.
pub fn report_from_response(raw: &str, thresholds: &RiskThresholds) -> (Report, RiskTier) {
    let report = parse_report(raw);
    let tier = thresholds.classify(report.score);
    (report, tier)
}

// ── Sessions ─────────────────────────────────────────────────────────────

/// Answer a follow-up question about the session's analysed contract.
///
/// On success the question and the answer are appended to the session log.
/// On failure the log is left untouched.
pub async fn ask_follow_up(
    session: &mut Session,
    question: &str,
    client: &dyn LlmClient,
    config: &AnalysisConfig,
    ctx: &RunContext,
) -> Result<String, GuardError> {
    let answer = answer_question(session, question, client, config, ctx).await?;
    session.append(ChatMessage::user(question));
    session.append(ChatMessage::assistant(answer.clone()));
    Ok(answer)
}

async fn answer_question(
    session: &Session,
    question: &str,
    client: &dyn LlmClient,
    config: &AnalysisConfig,
    ctx: &RunContext,
) -> Result<String, GuardError> {
    let analysis = session
        .analysis
        .as_ref()
        .ok_or_else(|| GuardError::NoAnalysis {
            session: session.id.clone(),
        })?;

    let prompt = build_follow_up_prompt(
        &analysis.document_excerpt,
        &analysis.body,
        session.messages(),
        question,
        &analysis.target_language,
    );
    debug!(
        "Session {}: follow-up #{} ({} prompt chars)",
        session.id,
        session.len() / 2 + 1,
        prompt.chars().count()
    );

    let generation =
        generate_with_retry(client, &prompt, RetryPolicy::from_config(config), ctx, None).await?;
    Ok(generation.text)
}

/// Analyse a document and make it the subject of session `id`.
///
/// Replaces any earlier analysis and clears the chat log.
pub async fn analyze_in_session(
    store: &SessionStore,
    id: &str,
    bytes: Vec<u8>,
    config: &AnalysisConfig,
    client: &dyn LlmClient,
    ctx: &RunContext,
) -> Result<AnalysisOutput, GuardError> {
    if store.get(id).is_none() {
        return Err(GuardError::SessionNotFound(id.to_string()));
    }
    let output = analyze_bytes_with(bytes, config, client, ctx).await?;
    store.update(id, |s| s.set_analysis(output.clone()))?;
    Ok(output)
}

/// [`ask_follow_up`] against a session held in a [`SessionStore`].
///
/// The store is not locked while the model is answering.
pub async fn ask_in_session(
    store: &SessionStore,
    id: &str,
    question: &str,
    client: &dyn LlmClient,
    config: &AnalysisConfig,
    ctx: &RunContext,
) -> Result<String, GuardError> {
    let snapshot = store
        .get(id)
        .ok_or_else(|| GuardError::SessionNotFound(id.to_string()))?;
    let answer = answer_question(&snapshot, question, client, config, ctx).await?;
    store.update(id, |s| {
        s.append(ChatMessage::user(question));
        s.append(ChatMessage::assistant(answer.clone()));
    })?;
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::session::Role;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every prompt and answers with a fixed reply.
    struct Recorder {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn analysed_session() -> Session {
        let mut s = Session::with_id("s");
        let (report, tier) = report_from_response(
            "RISK SCORE: 8\n- auto-renewal\nSUMMARY: avoid",
            &RiskThresholds::default(),
        );
        s.set_analysis(AnalysisOutput {
            tier,
            score: report.score,
            body: report.body,
            summary: report.summary,
            diagnostics: report.diagnostics,
            extraction: ExtractionStats::default(),
            request: RequestStats::default(),
            document_excerpt: "The tenant shall pay a renewal fee.".into(),
            target_language: "French".into(),
        });
        s
    }

    #[test]
    fn report_from_response_classifies() {
        let (r, t) = report_from_response("RISK SCORE: 8\nSUMMARY: x", &RiskThresholds::default());
        assert_eq!(r.score, 8);
        assert_eq!(t, RiskTier::High);

        let (r, t) = report_from_response("no score here", &RiskThresholds::default());
        assert_eq!(r.score, 5);
        assert_eq!(t, RiskTier::Moderate);
    }

    #[tokio::test]
    async fn follow_up_appends_question_and_answer() {
        let mut s = analysed_session();
        let client = Recorder::new("Yes, clause 3.");
        let config = AnalysisConfig::default();
        let ctx = RunContext::unbounded();

        let a = ask_follow_up(&mut s, "Is there a fee?", &client, &config, &ctx)
            .await
            .unwrap();
        assert_eq!(a, "Yes, clause 3.");
        let roles: Vec<Role> = s.list().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);

        let prompt = client.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("renewal fee"));
        assert!(prompt.contains("RISK SCORE: 8"));
        assert!(prompt.contains("Answer in French"));
        assert!(prompt.ends_with("Is there a fee?"));
    }

    #[tokio::test]
    async fn follow_up_history_is_sent_in_order() {
        let mut s = analysed_session();
        let client = Recorder::new("answer");
        let config = AnalysisConfig::default();
        let ctx = RunContext::unbounded();

        ask_follow_up(&mut s, "first?", &client, &config, &ctx).await.unwrap();
        ask_follow_up(&mut s, "second?", &client, &config, &ctx).await.unwrap();

        let prompt = client.prompts.lock().unwrap()[1].clone();
        let first = prompt.find("User: first?").unwrap();
        let reply = prompt.find("Assistant: answer").unwrap();
        assert!(first < reply);
        assert!(prompt.ends_with("second?"));
        assert_eq!(s.len(), 4);
    }

    #[tokio::test]
    async fn follow_up_without_analysis_fails_and_leaves_log() {
        let mut s = Session::with_id("empty");
        let client = Recorder::new("x");
        let err = ask_follow_up(
            &mut s,
            "?",
            &client,
            &AnalysisConfig::default(),
            &RunContext::unbounded(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GuardError::NoAnalysis { .. }));
        assert!(s.is_empty());
        assert!(client.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ask_in_session_updates_only_that_session() {
        let store = SessionStore::new();
        let mut a = analysed_session();
        a.id = "a".into();
        store.insert(a);
        let b = store.create();

        let client = Recorder::new("ok");
        let config = AnalysisConfig::default();
        let ctx = RunContext::unbounded();
        ask_in_session(&store, "a", "q", &client, &config, &ctx).await.unwrap();

        assert_eq!(store.get("a").unwrap().len(), 2);
        assert_eq!(store.get(&b).unwrap().len(), 0);

        let err = ask_in_session(&store, &b, "q", &client, &config, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::NoAnalysis { .. }));
    }

    #[tokio::test]
    async fn unknown_session_is_rejected() {
        let store = SessionStore::new();
        let client = Recorder::new("ok");
        let err = analyze_in_session(
            &store,
            "nope",
            b"%PDF-1.4".to_vec(),
            &AnalysisConfig::default(),
            &client,
            &RunContext::unbounded(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GuardError::SessionNotFound(_)));
    }
}
