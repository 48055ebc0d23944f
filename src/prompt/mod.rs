mod lexicon;

use crate::state::RequirementKind;
use lexicon::{
    ACKNOWLEDGEMENTS, BUG_WORDS, DETERMINERS, DIRECTIVE_MODALS, FRUSTRATION_PHRASES,
    FRUSTRATION_WORDS, IMPERATIVE_VERBS, QUESTION_OPENERS, QUESTION_WORDS, SCOPE_TOTAL,
    TRIGGER_WORDS, VERIFY_PHRASES,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Passthrough,
    Question,
    Task,
    BigTask,
}

impl PromptKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::Question => "question",
            Self::Task => "task",
            Self::BigTask => "big_task",
        }
    }

    pub fn is_task(self) -> bool {
        matches!(self, Self::Task | Self::BigTask)
    }
}

impl std::fmt::Display for PromptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptClassification {
    pub kind: PromptKind,
    pub triggers: BTreeSet<String>,
    pub frustration: bool,
    pub warnings: Vec<String>,
}

impl PromptClassification {
    fn passthrough_with_warning(warning: &str) -> Self {
        Self {
            kind: PromptKind::Passthrough,
            triggers: BTreeSet::new(),
            frustration: false,
            warnings: vec![warning.to_string()],
        }
    }
}

pub fn classify_value(value: &Value) -> PromptClassification {
    match value {
        Value::String(text) => classify(text),
        Value::Null => PromptClassification::passthrough_with_warning("prompt missing"),
        other => PromptClassification::passthrough_with_warning(&format!(
            "prompt is not a string ({})",
            json_type_name(other)
        )),
    }
}

pub fn classify(input: &str) -> PromptClassification {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();
    let tokens = tokenize(&lower);

    PromptClassification {
        kind: classify_kind(trimmed, &lower, &tokens),
        triggers: detect_triggers(&tokens),
        frustration: detect_frustration(trimmed, &lower, &tokens),
        warnings: Vec::new(),
    }
}

fn classify_kind(trimmed: &str, lower: &str, tokens: &[String]) -> PromptKind {
    let visible = lower
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '?')
        .count();
    if visible <= 2 {
        return PromptKind::Passthrough;
    }

    let mut body = tokens;
    if let Some(first) = lower.split_whitespace().next() {
        if is_acknowledgement(first) {
            let rest = if tokens.is_empty() { tokens } else { &tokens[1..] };
            if !has_imperative(rest) {
                return PromptKind::Passthrough;
            }
            body = rest;
        }
    }

    let imperative = has_imperative(body);
    if imperative && body.iter().any(|t| SCOPE_TOTAL.contains(&t.as_str())) {
        return PromptKind::BigTask;
    }
    if imperative {
        return PromptKind::Task;
    }
    if is_question(trimmed, body) {
        return PromptKind::Question;
    }
    PromptKind::Passthrough
}

// Apostrophes split words, so "what's" yields "what" and "s".
fn tokenize(lower: &str) -> Vec<String> {
    lower
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_acknowledgement(first_word: &str) -> bool {
    if first_word.starts_with('/') {
        return true;
    }
    let word = first_word.trim_end_matches(|c: char| c.is_ascii_punctuation());
    if word.is_empty() {
        return false;
    }
    ACKNOWLEDGEMENTS.contains(&word) || word.chars().all(|c| c.is_ascii_digit())
}

// A verb after a determiner is a noun ("about the fix") unless a directive
// modal follows it ("the fix should be ...").
fn has_imperative(tokens: &[String]) -> bool {
    tokens.iter().enumerate().any(|(idx, token)| {
        if !IMPERATIVE_VERBS.contains(&token.as_str()) {
            return false;
        }
        let preceded_by_determiner = idx > 0 && DETERMINERS.contains(&tokens[idx - 1].as_str());
        if !preceded_by_determiner {
            return true;
        }
        tokens
            .get(idx + 1)
            .map(|next| DIRECTIVE_MODALS.contains(&next.as_str()))
            .unwrap_or(false)
    })
}

fn is_question(trimmed: &str, tokens: &[String]) -> bool {
    if trimmed.ends_with('?') {
        return true;
    }
    if tokens
        .first()
        .map(|first| QUESTION_OPENERS.contains(&first.as_str()))
        .unwrap_or(false)
    {
        return true;
    }
    tokens.iter().any(|t| QUESTION_WORDS.contains(&t.as_str()))
}

fn detect_triggers(tokens: &[String]) -> BTreeSet<String> {
    tokens
        .iter()
        .filter_map(|token| {
            TRIGGER_WORDS
                .iter()
                .find(|(word, _)| word == token)
                .map(|(_, stem)| stem.to_string())
        })
        .collect()
}

fn detect_frustration(trimmed: &str, lower: &str, tokens: &[String]) -> bool {
    if FRUSTRATION_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return true;
    }
    if tokens.iter().any(|t| FRUSTRATION_WORDS.contains(&t.as_str())) {
        return true;
    }
    longest_all_caps_run(trimmed) >= 4
}

fn longest_all_caps_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for word in text.split_whitespace() {
        let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
        if letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase()) {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

pub fn requested_requirements(
    classification: &PromptClassification,
    input: &str,
) -> BTreeSet<RequirementKind> {
    let mut requested = BTreeSet::new();
    if classification.kind == PromptKind::Passthrough {
        return requested;
    }
    let lower = input.trim().to_lowercase();
    let tokens = tokenize(&lower);

    if tokens.iter().any(|t| t == "saneloop") {
        requested.insert(RequirementKind::Saneloop);
    }
    if classification.kind == PromptKind::BigTask {
        requested.insert(RequirementKind::Plan);
    }
    if classification.kind.is_task() {
        if tokens.iter().any(|t| BUG_WORDS.contains(&t.as_str())) {
            requested.insert(RequirementKind::BugNote);
        }
        if tokens.iter().any(|t| t == "verify")
            || VERIFY_PHRASES.iter().any(|phrase| lower.contains(phrase))
        {
            requested.insert(RequirementKind::Verify);
        }
    }
    requested
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
