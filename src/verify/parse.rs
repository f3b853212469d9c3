//! Tolerant parsing of the service's free-text reply.
//!
//! The reply is expected to carry a `MATCH` / `NO MATCH` token, an integer confidence
//! and free-text reasoning, typically as
//!
//! ```text
//! VERDICT: MATCH
//! CONFIDENCE: 92
//! REASONING: same letterhead, same signature block
//! ```
//!
//! Anything missing or malformed degrades to `NO MATCH` at the fallback confidence
//! with `needs_review` set. Parsing never fails.

use super::types::Verdict;
use crate::constants::FALLBACK_CONFIDENCE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub verdict: Verdict,
    pub confidence: u8,
    pub reasoning: String,
    pub needs_review: bool,
}

/// Upper-cased words of `text`, split on anything that is not alphanumeric.
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_uppercase())
        .collect()
}

/// Words that turn a following `MATCH` into a rejection.
const NEGATIONS: [&str; 3] = ["NO", "NOT", "NON"];

/// Finds the verdict token in `text`. `MATCH` preceded anywhere by a negation
/// (`NO MATCH`, `NOT A MATCH`) and `NOMATCH` count as `NO MATCH`.
fn find_verdict(text: &str) -> Option<Verdict> {
    let words = words(text);
    if words.iter().any(|w| w == "NOMATCH") {
        return Some(Verdict::NoMatch);
    }
    let at = words.iter().position(|w| w == "MATCH")?;
    if words[..at].iter().any(|w| NEGATIONS.contains(&w.as_str())) {
        Some(Verdict::NoMatch)
    } else {
        Some(Verdict::Match)
    }
}

/// Byte offset just past the first case-insensitive occurrence of `label`.
fn after_label(text: &str, label: &str) -> Option<usize> {
    text.to_ascii_uppercase()
        .find(label)
        .map(|pos| pos + label.len())
}

fn verdict_line(text: &str) -> Option<&str> {
    text.lines().find(|line| {
        line.trim_start()
            .trim_start_matches(['*', '#', '-', ' '])
            .to_ascii_uppercase()
            .starts_with("VERDICT")
    })
}

fn parse_verdict(text: &str) -> Option<Verdict> {
    match verdict_line(text) {
        Some(line) => find_verdict(line),
        None => find_verdict(text),
    }
}

fn parse_confidence(text: &str) -> Option<u8> {
    let start = after_label(text, "CONFIDENCE")?;
    let digits: String = text[start..]
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u8>().ok().filter(|c| *c <= 100)
}

fn parse_reasoning(text: &str) -> Option<String> {
    let start = after_label(text, "REASONING")?;
    let rest =
        text[start..].trim_start_matches(|c: char| c == ':' || c == '*' || c.is_whitespace());
    let reasoning = rest.trim();
    (!reasoning.is_empty()).then(|| reasoning.to_string())
}

pub fn parse_reply(text: &str) -> ParsedReply {
    let verdict = parse_verdict(text);
    let confidence = parse_confidence(text);
    let reasoning = parse_reasoning(text).unwrap_or_else(|| text.trim().to_string());

    match (verdict, confidence) {
        (Some(verdict), Some(confidence)) => ParsedReply {
            verdict,
            confidence,
            reasoning,
            needs_review: false,
        },
        _ => ParsedReply {
            verdict: Verdict::NoMatch,
            confidence: FALLBACK_CONFIDENCE,
            reasoning,
            needs_review: true,
        },
    }
}
