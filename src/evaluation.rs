//! Evaluation parsing.
//!
//! Models asked for JSON return it fenced, unfenced, or wrapped in prose.
//! Candidate substrings are pulled out by an ordered set of strategies and
//! the first one that decodes into an [`EvaluationResult`] wins. When none
//! does, the full text is returned as `{ rawText }`; parsing never fails the
//! request. JSON that parses but lacks the evaluation shape also degrades to
//! `rawText`, since consumers render the structured fields directly.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::evaluation::{EvaluationPayload, EvaluationResult};

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?i:json)\s*(.*?)\s*```").expect("valid fenced json regex")
});

static FENCED_ANY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*\s*(.*?)\s*```").expect("valid fenced block regex")
});

/// Where a candidate JSON substring came from, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// ```` ```json ... ``` ````
    FencedJson,
    /// Any fenced block; a leading language tag is skipped.
    FencedGeneric,
    /// First top-level `{ ... }` span in the text.
    BraceSpan,
}

impl Extraction {
    pub const ORDER: [Extraction; 3] = [
        Extraction::FencedJson,
        Extraction::FencedGeneric,
        Extraction::BraceSpan,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Extraction::FencedJson => "fenced_json",
            Extraction::FencedGeneric => "fenced_generic",
            Extraction::BraceSpan => "brace_span",
        }
    }

    pub fn extract<'a>(&self, text: &'a str) -> Option<&'a str> {
        match self {
            Extraction::FencedJson => capture(&FENCED_JSON, text),
            Extraction::FencedGeneric => capture(&FENCED_ANY, text),
            Extraction::BraceSpan => brace_span(text),
        }
    }
}

fn capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
}

/// First balanced `{...}` span, skipping braces inside JSON strings. If the
/// braces never balance, falls back to first `{` through last `}`.
pub fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }

    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// All candidates, in strategy priority order.
pub fn extract_candidates(text: &str) -> Vec<(Extraction, &str)> {
    Extraction::ORDER
        .iter()
        .filter_map(|strategy| strategy.extract(text).map(|c| (*strategy, c)))
        .collect()
}

/// Parse model output into an evaluation, degrading to `rawText`.
pub fn parse_evaluation(text: &str) -> EvaluationPayload {
    for (strategy, candidate) in extract_candidates(text) {
        match serde_json::from_str::<EvaluationResult>(candidate) {
            Ok(result) => {
                tracing::info!(strategy = strategy.name(), "Successfully parsed JSON evaluation");
                return EvaluationPayload::Structured(result);
            }
            Err(e) => {
                tracing::debug!(strategy = strategy.name(), error = %e, "Evaluation candidate rejected");
            }
        }
    }
    tracing::warn!(
        chars = text.len(),
        "Failed to parse JSON evaluation; returning raw text"
    );
    EvaluationPayload::raw(text)
}
