//! Locating the final answer inside a free-form model response.
//!
//! Extraction is an ordered chain of strategies. The first strategy that
//! produces a non-empty candidate wins, so adding a marker format means
//! inserting one more variant at the right position.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

/// One way of finding an answer in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// Last `\boxed{...}` or `\fbox{...}`.
    Boxed,
    /// Text after the last "final answer:" / "final answer is".
    FinalAnswerMarker,
    /// Text after the last "answer:" / "the answer is".
    AnswerMarker,
    /// Last `$$...$$` or `\[...\]` block.
    DisplayMath,
    /// Last `$...$` or `\(...\)` span.
    InlineMath,
    /// Last run of math-looking words containing a digit or operator.
    LastExpression,
}

impl ExtractionStrategy {
    pub fn default_chain() -> Vec<Self> {
        vec![
            Self::Boxed,
            Self::FinalAnswerMarker,
            Self::AnswerMarker,
            Self::DisplayMath,
            Self::InlineMath,
            Self::LastExpression,
        ]
    }

    /// Raw candidate text found by this strategy, before cleaning.
    pub fn find(self, text: &str) -> Option<String> {
        match self {
            Self::Boxed => last_boxed(text),
            Self::FinalAnswerMarker => after_last_marker(text, final_answer_regex()),
            Self::AnswerMarker => after_last_marker(text, answer_regex()),
            Self::DisplayMath => last_display_math(text),
            Self::InlineMath => last_inline_math(text),
            Self::LastExpression => last_expression(text),
        }
    }
}

impl std::fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Boxed => "boxed",
            Self::FinalAnswerMarker => "final_answer_marker",
            Self::AnswerMarker => "answer_marker",
            Self::DisplayMath => "display_math",
            Self::InlineMath => "inline_math",
            Self::LastExpression => "last_expression",
        };
        f.write_str(name)
    }
}

/// The extraction priority chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "ExtractionStrategy::default_chain")]
    pub strategies: Vec<ExtractionStrategy>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strategies: ExtractionStrategy::default_chain(),
        }
    }
}

/// A candidate answer and the strategy that found it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub strategy: ExtractionStrategy,
    pub text: String,
}

/// Find the candidate final answer in `response`.
pub fn extract_answer(
    response: &str,
    config: &ExtractionConfig,
) -> Result<Extraction, ExtractError> {
    if response.trim().is_empty() {
        return Err(ExtractError::EmptyResponse);
    }
    for &strategy in &config.strategies {
        let Some(raw) = strategy.find(response) else {
            continue;
        };
        let text = clean_candidate(&raw);
        if !text.is_empty() {
            tracing::debug!(%strategy, candidate = %text, "extracted answer");
            return Ok(Extraction { strategy, text });
        }
    }
    Err(ExtractError::NoCandidate)
}

/// Strip delimiters, `\boxed`, prose and trailing punctuation from a candidate.
pub fn clean_candidate(raw: &str) -> String {
    let mut s = raw.trim().to_string();
    loop {
        let before = s.clone();
        if let Some(rest) = s.strip_prefix("\\boxed").or_else(|| s.strip_prefix("\\fbox")) {
            if let Some(inner) = braced_after(rest) {
                s = inner;
            }
        }
        for (open, close) in [
            ("$$", "$$"),
            ("$", "$"),
            ("\\[", "\\]"),
            ("\\(", "\\)"),
            ("**", "**"),
            ("`", "`"),
        ] {
            if s.len() >= open.len() + close.len() && s.starts_with(open) && s.ends_with(close) {
                s = s[open.len()..s.len() - close.len()].to_string();
                break;
            }
        }
        s = strip_prose_text(&s);
        s = s
            .trim()
            .trim_end_matches(['.', ',', ';', ':'])
            .trim_end_matches("**")
            .trim_start_matches("**")
            .trim()
            .to_string();
        if s == before {
            return s;
        }
    }
}

/// Content of the `{...}` group at the start of `s`. An unclosed group
/// (truncated response) yields the rest of the text.
fn braced_after(s: &str) -> Option<String> {
    let rest = s.trim_start().strip_prefix('{')?;
    let mut depth = 1usize;
    for (i, c) in rest.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(rest[..i].to_string());
                }
            }
            _ => {}
        }
    }
    Some(rest.to_string())
}

fn last_boxed(text: &str) -> Option<String> {
    let mut found: Option<(usize, String)> = None;
    for command in ["\\boxed", "\\fbox"] {
        for (i, _) in text.match_indices(command) {
            let Some(content) = braced_after(&text[i + command.len()..]) else {
                continue;
            };
            if content.trim().is_empty() {
                continue;
            }
            if found.as_ref().map_or(true, |(j, _)| i > *j) {
                found = Some((i, content));
            }
        }
    }
    found.map(|(_, content)| content)
}

fn final_answer_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bfinal\s+answer(?:\s*\**\s*:|\s+is\b)[\s*:]*")
            .expect("final answer pattern is valid")
    })
}

fn answer_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\banswer(?:\s*\**\s*:|\s+is\b)[\s*:]*").expect("answer pattern is valid")
    })
}

fn display_math_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\$\$(.+?)\$\$|\\\[(.+?)\\\]").expect("display math pattern is valid")
    })
}

fn inline_math_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\$([^$]+?)\$|\\\((.+?)\\\)").expect("inline math pattern is valid")
    })
}

fn last_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text)
        .filter_map(|caps| caps.iter().skip(1).flatten().next().map(|m| m.as_str()))
        .filter(|s| !s.trim().is_empty())
        .last()
        .map(str::to_string)
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text)
        .filter_map(|caps| caps.iter().skip(1).flatten().next().map(|m| m.as_str()))
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn last_display_math(text: &str) -> Option<String> {
    last_capture(display_math_regex(), text)
}

fn last_inline_math(text: &str) -> Option<String> {
    last_capture(inline_math_regex(), text)
}

/// The answer following the last match of `marker`.
///
/// A math block starting right after the marker is taken whole. Otherwise
/// the rest of the line is used, preferring a boxed or math span inside it.
fn after_last_marker(text: &str, marker: &Regex) -> Option<String> {
    let m = marker.find_iter(text).last()?;
    let rest = text[m.end()..].trim_start();
    if rest.starts_with("$$") || rest.starts_with("\\[") {
        if let Some(block) = first_capture(display_math_regex(), rest) {
            return Some(block);
        }
    }
    let line = rest.lines().next().unwrap_or("");
    if let Some(boxed) = last_boxed(line) {
        return Some(boxed);
    }
    if let Some(math) = first_capture(inline_math_regex(), line) {
        return Some(math);
    }
    Some(trim_prose(line).to_string())
}

/// Cut a line at the end of its first sentence or at a trailing clause.
fn trim_prose(line: &str) -> &str {
    let mut end = line.len();
    for pat in [". ", ", where ", " where ", "; ", ", which ", ", so "] {
        if let Some(i) = line.find(pat) {
            end = end.min(i);
        }
    }
    &line[..end]
}

/// Drop `\text{...}` groups holding several words of prose; single-word
/// groups are usually units and are kept.
fn strip_prose_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(i) = rest.find("\\text") {
        out.push_str(&rest[..i]);
        let after = &rest[i + "\\text".len()..];
        match braced_after(after) {
            Some(content) if content.split_whitespace().count() > 1 => {
                let consumed = after.len() - after.trim_start().len() + content.len() + 2;
                rest = after.get(consumed..).unwrap_or("");
            }
            _ => {
                out.push_str("\\text");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

const MATH_WORDS: &[&str] = &[
    "sin", "cos", "tan", "sec", "csc", "cot", "sinh", "cosh", "tanh", "arcsin", "arccos", "arctan",
    "exp", "ln", "log", "sqrt", "pi",
];

fn is_operator(c: char) -> bool {
    matches!(
        c,
        '+' | '-' | '*' | '/' | '^' | '=' | '×' | '·' | '−' | '÷' | '√' | '²' | '³'
    )
}

/// Whether a whitespace-separated word can belong to a math expression.
fn is_math_word(word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    if word.chars().any(|c| c.is_ascii_digit() || is_operator(c) || c == '\\') {
        return word.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || is_operator(c)
                || matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '.' | '_' | '|' | '\\' | ',' | 'π')
        });
    }
    let letters = word.trim_matches(|c: char| matches!(c, '(' | ')'));
    (letters.chars().count() == 1 && letters.chars().all(char::is_alphabetic))
        || MATH_WORDS.contains(&letters)
}

fn last_expression(text: &str) -> Option<String> {
    let words: Vec<&str> = text
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| matches!(c, '*' | '`' | '"' | '\''))
                .trim_end_matches(['.', ',', ';', ':', '!', '?'])
        })
        .collect();

    let mut end = words.len();
    while end > 0 {
        let Some(last) = words[..end].iter().rposition(|w| is_math_word(w)) else {
            return None;
        };
        let mut start = last;
        while start > 0 && is_math_word(words[start - 1]) {
            start -= 1;
        }
        let run = &words[start..=last];
        if run
            .iter()
            .any(|w| w.chars().any(|c| c.is_ascii_digit() || is_operator(c)))
        {
            return Some(run.join(" "));
        }
        end = start;
    }
    None
}
