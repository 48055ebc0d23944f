use crate::breaker::{normalize_error, ErrorSignature};
use crate::security::shell_words;
use crate::tools::ToolCall;
use serde_json::Value;

const CONTENT_PRINTERS: &[&str] = &[
    "cat", "grep", "egrep", "fgrep", "rg", "ag", "head", "tail", "less", "more", "bat",
];

const IO_ERROR_MARKERS: &[&str] = &[
    "command not found",
    "permission denied",
    "no such file or directory",
    "fatal:",
    "** build failed **",
];

const ERROR_FIELDS: &[&str] = &["error", "message", "stderr", "stdout", "output", "content", "text"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub signature: ErrorSignature,
    pub evidence: String,
}

pub fn detect_failure(
    call: &ToolCall,
    response: &Value,
    top_level_error: Option<bool>,
) -> Option<Failure> {
    if reports_failure(response, top_level_error) {
        let evidence = error_text(response);
        return Some(Failure {
            signature: signature_for(call, &evidence),
            evidence: excerpt(&evidence),
        });
    }

    // A zero exit status is self-reported; the output is still scanned.
    if !call.is_shell() {
        return None;
    }
    let command = call.command.as_deref().unwrap_or_default();
    let stderr = field_text(response, "stderr");
    let mut evidence = io_error_evidence(&stderr);
    if evidence.is_none() && !prints_content(command) {
        let stdout = match response {
            Value::String(text) => text.clone(),
            _ => field_text(response, "stdout"),
        };
        evidence = io_error_evidence(&stdout);
    }
    evidence.map(|line| Failure {
        signature: signature_for(call, &line),
        evidence: excerpt(&line),
    })
}

fn reports_failure(response: &Value, top_level_error: Option<bool>) -> bool {
    if top_level_error == Some(true) {
        return true;
    }
    let Value::Object(map) = response else {
        return false;
    };
    let flagged = ["is_error", "isError", "interrupted"]
        .iter()
        .any(|key| map.get(*key).and_then(Value::as_bool) == Some(true));
    let nonzero_exit = ["exit_code", "exitCode", "returncode"]
        .iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_i64))
        .any(|code| code != 0);
    flagged || nonzero_exit || map.get("success").and_then(Value::as_bool) == Some(false)
}

fn io_error_evidence(text: &str) -> Option<String> {
    text.lines()
        .find(|line| {
            let lowered = line.trim().to_ascii_lowercase();
            lowered.starts_with("error:")
                || IO_ERROR_MARKERS
                    .iter()
                    .any(|marker| lowered.contains(marker))
        })
        .map(|line| line.trim().to_string())
}

fn prints_content(command: &str) -> bool {
    let parsed = shell_words::parse(command);
    let Some(first) = parsed.commands.first() else {
        return false;
    };
    match first.program() {
        Some("sed") => first.args().iter().any(|arg| arg == "-n" || arg == "--quiet"),
        Some("git") => first
            .args()
            .iter()
            .find(|arg| !arg.starts_with('-'))
            .is_some_and(|sub| matches!(sub.as_str(), "show" | "log" | "diff" | "blame" | "grep")),
        Some(program) => CONTENT_PRINTERS.contains(&program),
        None => false,
    }
}

fn signature_for(call: &ToolCall, evidence: &str) -> ErrorSignature {
    let signature = normalize_error(evidence);
    if signature == ErrorSignature::UnknownError && call.is_structured_edit() {
        return ErrorSignature::EditMismatch;
    }
    signature
}

fn error_text(response: &Value) -> String {
    match response {
        Value::String(text) => text.clone(),
        Value::Object(_) => {
            let parts: Vec<String> = ERROR_FIELDS
                .iter()
                .map(|key| field_text(response, key))
                .filter(|text| !text.trim().is_empty())
                .collect();
            parts.join("\n")
        }
        Value::Array(items) => items
            .iter()
            .map(error_text)
            .filter(|text| !text.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn field_text(response: &Value, key: &str) -> String {
    match response.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(200) {
        Some((index, _)) => format!("{}...", &trimmed[..index]),
        None => trimmed.to_string(),
    }
}
