//! Prompt construction for contract analysis and follow-up questions.
//!
//! Every prompt the library sends lives here so a wording change is a
//! one-file edit and unit tests can inspect prompts without a provider.
//!
//! The analysis prompt embeds a small output protocol: the reply must open
//! with `RISK SCORE: <1-10>` and close with a `SUMMARY:` section. Nothing here
//! enforces it; [`crate::pipeline::parse`] copes with replies that ignore it.

use crate::config::HighlightStyle;
use crate::session::{ChatMessage, Role};
use serde::{Deserialize, Serialize};

/// Label of the mandatory first line.
pub const SCORE_LABEL: &str = "RISK SCORE:";

/// Label of the mandatory closing section.
pub const SUMMARY_LABEL: &str = "SUMMARY:";

const ANALYSIS_PREAMBLE: &str = "You are a consumer-protection legal assistant. \
Analyse the contract below for scams, predatory language, hidden fees, automatic renewals, \
unfair termination terms and one-sided liability or arbitration clauses.";

const FOLLOW_UP_PREAMBLE: &str = "You are a consumer-protection legal assistant. \
You already reviewed the contract excerpt and wrote the risk report below. \
Answer the user's follow-up question using only the contract and the report. \
If the contract does not say, answer that it does not say.";

/// Options the prompt builder reads. See [`crate::config::AnalysisConfig::prompt_options`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOptions {
    /// Used verbatim, e.g. "Spanish".
    pub target_language: String,
    /// Maximum characters of document text embedded in the prompt.
    pub character_budget: usize,
    pub highlight_style: HighlightStyle,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            target_language: "English".to_string(),
            character_budget: crate::config::DEFAULT_CHARACTER_BUDGET,
            highlight_style: HighlightStyle::default(),
        }
    }
}

/// A fully-built analysis request, ready for [`crate::client::LlmClient::generate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// The single instruction string sent to the model.
    pub prompt: String,
    /// The document text that was embedded (already truncated).
    pub document_excerpt: String,
    /// Characters in the extracted text before truncation.
    pub document_chars: usize,
    /// Characters actually embedded.
    pub sent_chars: usize,
    pub target_language: String,
    pub highlight_style: HighlightStyle,
}

impl AnalysisRequest {
    pub fn truncated(&self) -> bool {
        self.sent_chars < self.document_chars
    }

    /// Characters of the document the model never sees.
    pub fn dropped_chars(&self) -> usize {
        self.document_chars - self.sent_chars
    }
}

/// Return the longest prefix of `text` holding at most `max_chars` characters.
///
/// Counts Unicode scalar values, so a multi-byte character is never split.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Build the analysis request for one document.
///
/// Pure and deterministic: the same inputs always give the same prompt.
/// Only the document segment is truncated; instructions are always complete.
pub fn build_analysis_request(extracted_text: &str, options: &PromptOptions) -> AnalysisRequest {
    let document_chars = extracted_text.chars().count();
    let excerpt = truncate_chars(extracted_text, options.character_budget);
    let sent_chars = excerpt.chars().count();

    let mut rules: Vec<String> = vec![
        format!(
            "The FIRST line of your reply must be exactly `{SCORE_LABEL} N`, where N is a whole \
number from 1 (safe) to 10 (dangerous). Write nothing before it."
        ),
        "Then list every red flag as a bullet: quote the clause and explain the risk in plain words."
            .to_string(),
    ];
    match options.highlight_style {
        HighlightStyle::InlineMarkup => rules.push(
            "Wrap dangerous words and legal terms of art in **double asterisks**.".to_string(),
        ),
        HighlightStyle::None => {
            rules.push("Do not use markdown emphasis or bold text.".to_string())
        }
    }
    rules.push(format!(
        "End your reply with a section that starts with the label `{SUMMARY_LABEL}` followed by \
two or three sentences of practical advice."
    ));
    rules.push(format!(
        "Keep the labels `{SCORE_LABEL}` and `{SUMMARY_LABEL}` in English even when writing in \
another language."
    ));

    let mut prompt = String::with_capacity(excerpt.len() + 1024);
    prompt.push_str(ANALYSIS_PREAMBLE);
    prompt.push_str("\n\nWrite the whole report in ");
    prompt.push_str(&options.target_language);
    prompt.push_str(".\n\nFollow these rules precisely:\n");
    for (i, rule) in rules.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, rule));
    }
    if sent_chars < document_chars {
        prompt.push_str(&format!(
            "\nOnly the first {sent_chars} characters of the contract are included below.\n"
        ));
    }
    prompt.push_str("\nCONTRACT TEXT:\n\"\"\"\n");
    prompt.push_str(excerpt);
    prompt.push_str("\n\"\"\"");

    AnalysisRequest {
        prompt,
        document_excerpt: excerpt.to_string(),
        document_chars,
        sent_chars,
        target_language: options.target_language.clone(),
        highlight_style: options.highlight_style,
    }
}

/// Build the prompt for a single follow-up question.
///
/// The contract excerpt, the previous report and the chat history so far are
/// passed as context; the model is stateless between calls.
pub fn build_follow_up_prompt(
    document_excerpt: &str,
    report_body: &str,
    history: &[ChatMessage],
    question: &str,
    target_language: &str,
) -> String {
    let mut prompt = String::with_capacity(document_excerpt.len() + report_body.len() + 512);
    prompt.push_str(FOLLOW_UP_PREAMBLE);
    prompt.push_str("\n\nAnswer in ");
    prompt.push_str(target_language);
    prompt.push_str(".\n\nCONTRACT TEXT:\n\"\"\"\n");
    prompt.push_str(document_excerpt);
    prompt.push_str("\n\"\"\"\n\nRISK REPORT:\n\"\"\"\n");
    prompt.push_str(report_body);
    prompt.push_str("\n\"\"\"\n");

    if !history.is_empty() {
        prompt.push_str("\nCONVERSATION SO FAR:\n");
        for msg in history {
            let who = match msg.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            prompt.push_str(&format!("{who}: {}\n", msg.content));
        }
    }

    prompt.push_str("\nQUESTION:\n");
    prompt.push_str(question);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(budget: usize) -> PromptOptions {
        PromptOptions {
            character_budget: budget,
            ..Default::default()
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn long_text_is_truncated_but_instructions_survive() {
        let text = "x".repeat(9000);
        let req = build_analysis_request(&text, &opts(8000));
        assert_eq!(req.sent_chars, 8000);
        assert_eq!(req.document_chars, 9000);
        assert!(req.truncated());
        assert_eq!(req.dropped_chars(), 1000);
        assert!(req.prompt.contains(SCORE_LABEL));
        assert!(req.prompt.contains(SUMMARY_LABEL));
        assert!(req.prompt.contains("first 8000 characters"));
        assert!(!req.prompt.contains(&"x".repeat(8001)));
    }

    #[test]
    fn short_text_is_embedded_whole() {
        let req = build_analysis_request("Tenant pays all repairs.", &opts(8000));
        assert!(!req.truncated());
        assert!(req.prompt.contains("Tenant pays all repairs."));
        assert!(!req.prompt.contains("Only the first"));
    }

    #[test]
    fn empty_text_still_builds_a_request() {
        let req = build_analysis_request("", &PromptOptions::default());
        assert_eq!(req.sent_chars, 0);
        assert_eq!(req.document_excerpt, "");
        assert!(req.prompt.contains("CONTRACT TEXT:"));
        assert!(req.prompt.starts_with(ANALYSIS_PREAMBLE));
    }

    #[test]
    fn language_is_used_verbatim() {
        let options = PromptOptions {
            target_language: "Brazilian Portuguese".into(),
            ..Default::default()
        };
        let req = build_analysis_request("text", &options);
        assert!(req.prompt.contains("Write the whole report in Brazilian Portuguese."));
    }

    #[test]
    fn highlight_style_changes_instruction() {
        let marked = build_analysis_request("t", &PromptOptions::default());
        assert!(marked.prompt.contains("**double asterisks**"));

        let plain = build_analysis_request(
            "t",
            &PromptOptions {
                highlight_style: HighlightStyle::None,
                ..Default::default()
            },
        );
        assert!(plain.prompt.contains("Do not use markdown emphasis"));
        assert!(!plain.prompt.contains("**double asterisks**"));
    }

    #[test]
    fn builder_is_deterministic() {
        let a = build_analysis_request("same input", &PromptOptions::default());
        let b = build_analysis_request("same input", &PromptOptions::default());
        assert_eq!(a, b);
    }

    #[test]
    fn follow_up_includes_history_in_order() {
        let history = vec![
            ChatMessage::user("Can I cancel early?"),
            ChatMessage::assistant("Only with a 3-month fee."),
        ];
        let prompt = build_follow_up_prompt(
            "contract",
            "RISK SCORE: 6",
            &history,
            "Is the fee legal?",
            "English",
        );
        let q1 = prompt.find("User: Can I cancel early?").unwrap();
        let a1 = prompt.find("Assistant: Only with a 3-month fee.").unwrap();
        let q2 = prompt.find("Is the fee legal?").unwrap();
        assert!(q1 < a1 && a1 < q2);
        assert!(prompt.contains("RISK SCORE: 6"));
    }

    #[test]
    fn follow_up_without_history_has_no_conversation_block() {
        let prompt = build_follow_up_prompt("c", "r", &[], "q", "German");
        assert!(!prompt.contains("CONVERSATION SO FAR"));
        assert!(prompt.contains("Answer in German."));
    }
}
