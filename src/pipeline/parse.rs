//! Report parsing: free-text model reply → [`Report`].
//!
//! The parser is a total function. Models do not reliably follow the output
//! protocol, so every deviation becomes a [`Diagnostic`] on an otherwise
//! usable report instead of an error.
//!
//! ## Anchoring
//!
//! Only the first non-empty line is inspected for the score. A reply such as
//! "This lease is mostly fine … the risk score of 3 for clause 2 …" must not
//! produce a score of 3, so a match anywhere else in the body is ignored.

use crate::prompts::{SCORE_LABEL, SUMMARY_LABEL};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Score used when the reply carries no usable score line.
pub const DEFAULT_SCORE: u8 = 5;

/// Lowest score on the scale.
pub const MIN_SCORE: u8 = 1;

/// Highest score on the scale.
pub const MAX_SCORE: u8 = 10;

/// A non-fatal note about how the reply deviated from the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The first non-empty line is not a score line; the default was used.
    ScoreNotFound,
    /// A score line was found but its value lies outside 1–10.
    ScoreOutOfRange { raw: String, clamped_to: u8 },
    /// No `SUMMARY:` section was found.
    SummaryNotFound,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::ScoreNotFound => write!(
                f,
                "no '{SCORE_LABEL}' line at the start of the reply; using default score {DEFAULT_SCORE}"
            ),
            Diagnostic::ScoreOutOfRange { raw, clamped_to } => {
                write!(f, "score '{raw}' is outside 1-10; clamped to {clamped_to}")
            }
            Diagnostic::SummaryNotFound => write!(f, "no '{SUMMARY_LABEL}' section in the reply"),
        }
    }
}

/// Structured view of one model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Always within 1–10.
    pub score: u8,
    /// The full reply, byte-for-byte.
    pub body: String,
    /// Text of the closing `SUMMARY:` section, if present.
    pub summary: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    /// Whether the score came from the reply rather than [`DEFAULT_SCORE`].
    pub fn score_found(&self) -> bool {
        !self.diagnostics.contains(&Diagnostic::ScoreNotFound)
    }
}

// Leading markdown decoration a model may put around the label: headings,
// quotes, bold/italic markers, code ticks.
static RE_SCORE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[\s#>*_`]*risk\s+score\s*[*_`]*\s*:\s*[*_`]*\s*(\d+)").unwrap()
});

static RE_SUMMARY_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t#>*_`]*summary[ \t]*[*_`]*[ \t]*:[*_`]*").unwrap());

/// Parse a raw reply into a [`Report`]. Never fails.
pub fn parse_report(raw: &str) -> Report {
    let mut diagnostics = Vec::new();
    let score = extract_score(raw, &mut diagnostics);
    let summary = extract_summary(raw);
    if summary.is_none() {
        diagnostics.push(Diagnostic::SummaryNotFound);
    }

    for d in &diagnostics {
        warn!("Report parse: {}", d);
    }
    debug!(
        "Parsed report: score={}, body={} bytes, summary={}",
        score,
        raw.len(),
        summary.is_some()
    );

    Report {
        score,
        body: raw.to_string(),
        summary,
        diagnostics,
    }
}

fn extract_score(raw: &str, diagnostics: &mut Vec<Diagnostic>) -> u8 {
    let first_line = raw.lines().find(|l| !l.trim().is_empty()).unwrap_or("");

    let Some(caps) = RE_SCORE_LINE.captures(first_line) else {
        diagnostics.push(Diagnostic::ScoreNotFound);
        return DEFAULT_SCORE;
    };

    let digits = &caps[1];
    let clamped = match digits.parse::<u64>() {
        Ok(n) if (MIN_SCORE as u64..=MAX_SCORE as u64).contains(&n) => return n as u8,
        Ok(0) => MIN_SCORE,
        // Too many digits for u64 is still "too large".
        _ => MAX_SCORE,
    };
    diagnostics.push(Diagnostic::ScoreOutOfRange {
        raw: digits.to_string(),
        clamped_to: clamped,
    });
    clamped
}

fn extract_summary(raw: &str) -> Option<String> {
    let label = RE_SUMMARY_LABEL.find_iter(raw).last()?;
    let text = raw[label.end()..].trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn well_formed_reply() {
        let raw = "RISK SCORE: 8\nRed flags: ...\nSUMMARY: risky";
        let r = parse_report(raw);
        assert_eq!(r.score, 8);
        assert_eq!(r.body, raw);
        assert_eq!(r.summary.as_deref(), Some("risky"));
        assert!(r.diagnostics.is_empty());
        assert!(r.score_found());
    }

    #[test]
    fn missing_score_defaults_to_five() {
        let r = parse_report("This contract seems fine overall.");
        assert_eq!(r.score, DEFAULT_SCORE);
        assert_eq!(r.score, 5);
        assert!(r.diagnostics.contains(&Diagnostic::ScoreNotFound));
        assert!(!r.score_found());
    }

    #[test]
    fn out_of_range_is_clamped_high() {
        let r = parse_report("RISK SCORE: 15\n...");
        assert_eq!(r.score, 10);
        assert!(r.diagnostics.contains(&Diagnostic::ScoreOutOfRange {
            raw: "15".into(),
            clamped_to: 10
        }));
    }

    #[test]
    fn zero_is_clamped_low() {
        let r = parse_report("RISK SCORE: 0");
        assert_eq!(r.score, 1);
        assert!(matches!(
            r.diagnostics[0],
            Diagnostic::ScoreOutOfRange { clamped_to: 1, .. }
        ));
    }

    #[test]
    fn huge_number_is_clamped_not_rejected() {
        let r = parse_report("RISK SCORE: 99999999999999999999999999");
        assert_eq!(r.score, 10);
        assert!(matches!(r.diagnostics[0], Diagnostic::ScoreOutOfRange { .. }));
    }

    #[test]
    fn later_score_in_prose_is_ignored() {
        let raw = "This lease is mostly fine.\nThe risk score of 3 for clause 2 is low.\nRISK SCORE: 9";
        let r = parse_report(raw);
        assert_eq!(r.score, DEFAULT_SCORE);
        assert!(r.diagnostics.contains(&Diagnostic::ScoreNotFound));
    }

    #[test]
    fn leading_blank_lines_are_skipped() {
        let r = parse_report("\n\n   \nRISK SCORE: 2\nSUMMARY: fine");
        assert_eq!(r.score, 2);
    }

    #[test]
    fn label_is_case_insensitive_and_tolerates_markdown() {
        assert_eq!(parse_report("risk score: 7").score, 7);
        assert_eq!(parse_report("**RISK SCORE:** 6").score, 6);
        assert_eq!(parse_report("## Risk Score: 3/10").score, 3);
        assert_eq!(parse_report("RISK SCORE : 4").score, 4);
    }

    #[test]
    fn non_numeric_value_is_not_a_score() {
        let r = parse_report("RISK SCORE: high\nSUMMARY: x");
        assert_eq!(r.score, DEFAULT_SCORE);
        assert!(r.diagnostics.contains(&Diagnostic::ScoreNotFound));
    }

    #[test]
    fn summary_takes_last_labelled_section() {
        let raw = "RISK SCORE: 5\nSummary: of clauses below\n- a\n- b\n**SUMMARY:** Negotiate clause 4.\nAvoid signing as is.";
        let r = parse_report(raw);
        assert_eq!(
            r.summary.as_deref(),
            Some("Negotiate clause 4.\nAvoid signing as is.")
        );
    }

    #[test]
    fn missing_summary_is_a_diagnostic() {
        let r = parse_report("RISK SCORE: 5\nno closing section");
        assert_eq!(r.summary, None);
        assert_eq!(r.diagnostics, vec![Diagnostic::SummaryNotFound]);
    }

    #[test]
    fn empty_reply_is_a_degraded_report() {
        let r = parse_report("");
        assert_eq!(r.score, DEFAULT_SCORE);
        assert_eq!(r.body, "");
        assert!(r.diagnostics.contains(&Diagnostic::ScoreNotFound));
    }

    #[test]
    fn diagnostics_serialise_with_kind_tag() {
        let json = serde_json::to_string(&Diagnostic::ScoreNotFound).unwrap();
        assert_eq!(json, r#"{"kind":"score_not_found"}"#);
    }

    proptest! {
        #[test]
        fn well_formed_first_line_yields_its_score(n in 1u8..=10, rest in "[ -~\n]{0,200}") {
            let raw = format!("RISK SCORE: {n}\n{rest}");
            let r = parse_report(&raw);
            prop_assert_eq!(r.score, n);
            prop_assert_eq!(r.body, raw);
        }

        #[test]
        fn replies_without_a_score_line_default(raw in "[a-zA-Z0-9 .,\n]{0,300}") {
            let r = parse_report(&raw);
            prop_assert_eq!(r.score, DEFAULT_SCORE);
            prop_assert!(r.diagnostics.contains(&Diagnostic::ScoreNotFound));
            prop_assert_eq!(r.body, raw);
        }

        #[test]
        fn parsing_is_idempotent(raw in "\\PC{0,300}") {
            prop_assert_eq!(parse_report(&raw), parse_report(&raw));
        }

        #[test]
        fn score_is_always_in_range(raw in "(RISK SCORE: [0-9]{1,30})?[ -~\n]{0,100}") {
            let r = parse_report(&raw);
            prop_assert!((MIN_SCORE..=MAX_SCORE).contains(&r.score));
        }
    }
}
