//! CLI binary for legal-guard.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig`, prints a colour-coded report and optionally opens a
//! follow-up chat about the analysed contract.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use legal_guard::pipeline::input::load_document;
use legal_guard::{
    analyze_bytes_with, ask_follow_up, resolve_client, AnalysisConfig, AnalysisOutput,
    AnalysisProgressCallback, ErrorAdvice, GuardError, HighlightStyle, LlmError,
    ProgressCallback, RiskThresholds, RiskTier, RunContext, Session, SUPPORTED_LANGUAGES,
};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

fn tier_colour(tier: RiskTier, s: &str) -> String {
    match tier.color_name() {
        "red" => red(s),
        "yellow" => yellow(s),
        _ => green(s),
    }
}

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner driven by the pipeline's stage events.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Self::with_bar(ProgressBar::new_spinner())
    }

    fn with_bar(bar: ProgressBar) -> Arc<Self> {
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER_TICKS);
        bar.set_style(style);
        bar.set_prefix("Reading");
        bar.set_message("Opening contract…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    /// Clear the spinner so error output is not drawn over.
    fn stop(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_extraction_complete(&self, total_pages: usize, failed_pages: usize, chars: usize) {
        let line = if failed_pages == 0 {
            format!(
                "  {} {} pages, {}",
                green("✓"),
                total_pages,
                dim(&format!("{chars} chars"))
            )
        } else {
            format!(
                "  {} {} pages ({} unreadable), {}",
                yellow("⚠"),
                total_pages,
                failed_pages,
                dim(&format!("{chars} chars"))
            )
        };
        self.bar.println(line);
        self.bar.set_prefix("Analysing");
    }

    fn on_request_start(&self, attempt: u32, client: &str) {
        if attempt == 1 {
            self.bar.set_message(format!("asking {client}…"));
        } else {
            self.bar.set_message(format!("asking {client} (attempt {attempt})…"));
        }
    }

    fn on_retry_scheduled(&self, attempt: u32, delay: Duration, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} attempt {} failed: {}  {}",
            yellow("↻"),
            attempt,
            msg,
            dim(&format!("retrying in {:.1}s", delay.as_secs_f64()))
        ));
    }

    fn on_report_ready(&self, _tier: RiskTier, _score: u8) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a lease and print the report
  legal-guard lease.pdf

  # Report in Spanish, plain text without bold markup
  legal-guard --language Spanish --highlight none lease.pdf

  # Ask follow-up questions after the report
  legal-guard --chat lease.pdf

  # Use OpenAI instead of Gemini
  legal-guard --provider openai --model gpt-4.1-mini lease.pdf

  # Try a specific Gemini model first, then fall back
  legal-guard --model gemini-2.5-flash --model gemini-2.0-flash lease.pdf

  # Machine-readable output
  legal-guard --json lease.pdf > report.json

RISK TIERS:
  Score   Tier       Meaning
  ─────   ────────   ─────────────────────────────────────
  7–10    HIGH       Predatory or one-sided terms; get advice
  4–6     MODERATE   Clauses worth negotiating
  1–3     LOW        Nothing alarming found

ENVIRONMENT VARIABLES:
  GEMINI_KEY              Google Gemini API key (GEMINI_API_KEY also accepted)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Log filter, e.g. legal_guard=debug

NOTE:
  Only the first --budget characters (default 8000) of the contract are
  sent to the model. Clauses beyond that are not analysed.
"#;

/// Scan PDF contracts for predatory clauses with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "legal-guard",
    version,
    about = "Scan PDF contracts for scams and predatory clauses with an LLM",
    long_about = "Extract the text of a PDF contract, ask an LLM to flag scams, hidden fees and \
one-sided clauses, and print a risk report scored 1–10 and classified LOW / MODERATE / HIGH. \
Supports Google Gemini directly and OpenAI, Anthropic, Ollama and others through edgequake-llm.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "list_languages")]
    input: Option<String>,

    /// Language of the report.
    #[arg(short, long, env = "LEGAL_GUARD_LANGUAGE", default_value = "English")]
    language: String,

    /// Characters of contract text sent to the model.
    #[arg(long, env = "LEGAL_GUARD_BUDGET", default_value_t = legal_guard::DEFAULT_CHARACTER_BUDGET)]
    budget: usize,

    /// Emphasis style asked of the model: inline (bold risky terms) or none.
    #[arg(long, env = "LEGAL_GUARD_HIGHLIGHT", value_enum, default_value = "inline")]
    highlight: HighlightArg,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_LLM_PROVIDER",
        long_help = "LLM provider. Auto-detected if not set: GEMINI_KEY selects Gemini, \
          otherwise edgequake-llm scans OPENAI_API_KEY, ANTHROPIC_API_KEY, …"
    )]
    provider: Option<String>,

    /// Model ID; repeat to give a fallback order.
    #[arg(
        long = "model",
        env = "EDGEQUAKE_MODEL",
        value_delimiter = ',',
        long_help = "Model to use. Repeat (or comma-separate) to set a fallback order; the next \
          model is tried only when the previous one does not exist.\n\
          Default for Gemini: gemini-2.0-flash, gemini-1.5-flash-latest, gemini-1.5-flash."
    )]
    models: Vec<String>,

    /// API key for Gemini.
    #[arg(long, env = "GEMINI_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Retries after a rate-limited or transient failure.
    #[arg(long, env = "LEGAL_GUARD_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-request LLM timeout in seconds.
    #[arg(long, env = "LEGAL_GUARD_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Abort the whole run after this many seconds.
    #[arg(long, env = "LEGAL_GUARD_DEADLINE")]
    deadline: Option<u64>,

    /// Lowest score classified MODERATE.
    #[arg(long, env = "LEGAL_GUARD_MODERATE_THRESHOLD", default_value_t = 4,
          value_parser = clap::value_parser!(u8).range(1..=10))]
    moderate_threshold: u8,

    /// Lowest score classified HIGH.
    #[arg(long, env = "LEGAL_GUARD_HIGH_THRESHOLD", default_value_t = 7,
          value_parser = clap::value_parser!(u8).range(1..=10))]
    high_threshold: u8,

    /// Output structured JSON (AnalysisOutput) instead of the coloured report.
    #[arg(long, env = "LEGAL_GUARD_JSON", conflicts_with = "chat")]
    json: bool,

    /// Ask follow-up questions after the report (/clear, /quit).
    #[arg(long)]
    chat: bool,

    /// Print the supported report languages and exit.
    #[arg(long)]
    list_languages: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LEGAL_GUARD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except the report and errors.
    #[arg(short, long, env = "LEGAL_GUARD_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum HighlightArg {
    Inline,
    None,
}

impl From<HighlightArg> for HighlightStyle {
    fn from(v: HighlightArg) -> Self {
        match v {
            HighlightArg::Inline => HighlightStyle::InlineMarkup,
            HighlightArg::None => HighlightStyle::None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_languages {
        for lang in SUPPORTED_LANGUAGES {
            println!("{lang}");
        }
        return Ok(());
    }

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides the feedback that matters; library INFO logs
    // would tear it, so they are only shown when the spinner is off.
    let show_progress = !cli.quiet && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if !SUPPORTED_LANGUAGES
        .iter()
        .any(|l| l.eq_ignore_ascii_case(&cli.language))
        && !cli.quiet
    {
        eprintln!(
            "{} '{}' is not in the tested language list (see --list-languages); using it anyway.",
            yellow("⚠"),
            cli.language
        );
    }

    // ── Build config ─────────────────────────────────────────────────────
    let spinner = show_progress.then(CliProgressCallback::new);
    let stop_spinner = || {
        if let Some(s) = &spinner {
            s.stop();
        }
    };
    let progress_cb: Option<ProgressCallback> = spinner
        .clone()
        .map(|cb| cb as Arc<dyn AnalysisProgressCallback>);
    let config = match build_config(&cli, progress_cb) {
        Ok(config) => config,
        Err(e) => {
            stop_spinner();
            return Err(e);
        }
    };

    // ── Cancellation on Ctrl-C ───────────────────────────────────────────
    let (ctx, cancel) = RunContext::new();
    let ctx = ctx.with_optional_deadline(config.deadline_secs);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    // ── Run analysis ─────────────────────────────────────────────────────
    let input = cli.input.as_deref().context("No input file given")?;
    let output = match run_analysis(input, &config, &ctx).await {
        Ok(output) => output,
        Err(e) => {
            stop_spinner();
            return Err(report_failure(e));
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    print_report(&output, cli.quiet).context("Failed to write report")?;

    if cli.chat {
        chat_loop(output, &config, &ctx).await?;
    }

    Ok(())
}

async fn run_analysis(
    input: &str,
    config: &AnalysisConfig,
    ctx: &RunContext,
) -> Result<AnalysisOutput, GuardError> {
    let bytes = ctx
        .run(load_document(input, config.api_timeout_secs))
        .await??;
    let client = resolve_client(config)?;
    analyze_bytes_with(bytes, config, client.as_ref(), ctx).await
}

/// Print a user-facing explanation and turn the error into an exit.
fn report_failure(err: GuardError) -> anyhow::Error {
    if let Some(LlmError::QuotaExceeded {
        provider,
        retry_after_secs,
    }) = err.llm_error()
    {
        let wait = retry_after_secs
            .map(|s| format!("{s} seconds"))
            .unwrap_or_else(|| "a minute".to_string());
        eprintln!(
            "{} {} is rate-limiting requests. Wait {} and try again.",
            yellow("⏳"),
            provider,
            wait
        );
    } else {
        let hint = match err.advice() {
            ErrorAdvice::RetryLater => Some("This is usually temporary; try again shortly."),
            ErrorAdvice::FixConfiguration => Some("Check your API key, provider and options."),
            ErrorAdvice::TryDifferentFile => Some("Try a different PDF."),
            ErrorAdvice::Other => None,
        };
        if let Some(hint) = hint {
            eprintln!("{} {}", cyan("ℹ"), hint);
        }
    }
    anyhow::Error::new(err).context("Analysis failed")
}

/// Map CLI args to `AnalysisConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .target_language(cli.language.clone())
        .character_budget(cli.budget)
        .highlight_style(cli.highlight.clone().into())
        .thresholds(RiskThresholds {
            moderate_min: cli.moderate_threshold,
            high_min: cli.high_threshold,
        })
        .models(cli.models.iter().map(|m| m.trim().to_string()))
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.timeout);

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(secs) = cli.deadline {
        builder = builder.deadline_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_report(output: &AnalysisOutput, quiet: bool) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let headline = format!("RISK: {} ({}/10)", output.tier, output.score);
    writeln!(out)?;
    writeln!(out, "{}", bold(&tier_colour(output.tier, &headline)))?;
    if output.tier == RiskTier::Low {
        writeln!(out, "{}", green("🎉 Looks safe! No major red flags found. 🎉"))?;
    }
    writeln!(out)?;
    out.write_all(output.body.as_bytes())?;
    if !output.body.ends_with('\n') {
        writeln!(out)?;
    }

    if quiet {
        return Ok(());
    }

    // Notes go to stderr so the report on stdout stays clean.
    if output.extraction.truncated {
        eprintln!(
            "\n{} Only the first {} of {} characters were analysed.",
            yellow("⚠"),
            output.extraction.sent_chars,
            output.extraction.extracted_chars
        );
    }
    if !output.extraction.failed_pages.is_empty() {
        eprintln!(
            "{} {} page(s) could not be read and were skipped.",
            yellow("⚠"),
            output.extraction.failed_pages.len()
        );
    }
    for d in &output.diagnostics {
        eprintln!("{} {}", dim("note:"), dim(&d.to_string()));
    }
    eprintln!(
        "{}",
        dim(&format!(
            "{} · {} attempt(s) · {}ms",
            output.request.client, output.request.attempts, output.request.total_duration_ms
        ))
    );
    Ok(())
}

/// Wait for the next input line. `None` on end of input, Ctrl-C or deadline.
async fn next_question<R>(lines: &mut Lines<R>, ctx: &RunContext) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    match ctx.run(lines.next_line()).await {
        Ok(line) => line.context("Failed to read stdin"),
        Err(GuardError::Cancelled | GuardError::DeadlineExceeded { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Interactive follow-up Q&A about the analysed contract.
async fn chat_loop(output: AnalysisOutput, config: &AnalysisConfig, ctx: &RunContext) -> Result<()> {
    let client = resolve_client(config).context("Failed to initialise LLM client")?;
    let mut session = Session::new();
    session.set_analysis(output);

    eprintln!(
        "\n{} Ask questions about this contract. {} clears the history, {} exits.",
        cyan("◆"),
        bold("/clear"),
        bold("/quit")
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("{} ", cyan("?"));
        io::stderr().flush().ok();

        let Some(line) = next_question(&mut lines, ctx).await? else {
            break;
        };
        let question = line.trim();
        match question {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                eprintln!("{}", dim("history cleared"));
                continue;
            }
            _ => {}
        }

        match ask_follow_up(&mut session, question, client.as_ref(), config, ctx).await {
            Ok(answer) => println!("{}\n", answer.trim_end()),
            Err(GuardError::Cancelled) => break,
            Err(e) => {
                let e = report_failure(e);
                eprintln!("{} {:#}", red("✗"), e);
            }
        }
    }
    Ok(())
}
