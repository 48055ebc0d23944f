use crate::state::ResearchCategory;
use crate::tools::ToolCall;
use serde_json::Value;

const EMPTY_LITERALS: &[&str] = &["[]", "{}", "null", "none", "n/a"];

// Matched anywhere in a short response, ignoring case.
const EMPTY_PHRASES: &[&str] = &[
    "no matches",
    "no match found",
    "no files found",
    "no results",
    "0 results",
    "zero results",
    "found 0 files",
    "found 0 matches",
    "no findings",
    "nothing found",
    "nothing relevant",
    "no content",
    "file is empty",
    "no documentation found",
    "no documents found",
    "did not return any",
    "returned no ",
];

const SHORT_RESPONSE_CHARS: usize = 240;

const METADATA_KEYS: &[&str] = &[
    "type",
    "mode",
    "query",
    "durationMs",
    "totalDurationMs",
    "numFiles",
    "numLines",
    "numMatches",
    "startLine",
    "totalLines",
    "filePath",
    "file_path",
    "path",
    "isError",
    "is_error",
    "interrupted",
    "isImage",
    "truncated",
    "url",
    "code",
    "codeText",
    "bytes",
];

const COUNT_KEYS: &[&str] = &["numFiles", "numMatches", "numLines", "totalResults", "total_count"];

pub fn category_for(call: &ToolCall) -> Option<ResearchCategory> {
    if let Some((server, operation)) = call.mcp_parts() {
        let server = server.to_ascii_lowercase();
        let operation = operation.to_ascii_lowercase();
        if server == "memory"
            && matches!(operation.as_str(), "read_graph" | "search_nodes" | "open_nodes")
        {
            return Some(ResearchCategory::Memory);
        }
        if server == "github"
            && ["search_", "get_", "list_"]
                .iter()
                .any(|prefix| operation.starts_with(prefix))
        {
            return Some(ResearchCategory::Github);
        }
        if server == "context7" || server.contains("docs") || operation.contains("docs") {
            return Some(ResearchCategory::Docs);
        }
        return None;
    }
    match call.normalized_name().as_str() {
        "websearch" | "webfetch" => Some(ResearchCategory::Web),
        "read" | "grep" | "glob" | "task" => Some(ResearchCategory::Local),
        _ => None,
    }
}

pub fn is_meaningful(category: ResearchCategory, response: &Value) -> bool {
    if category == ResearchCategory::Memory && contains_memory_graph(response) {
        return true;
    }
    has_substance(response)
}

// `{"entities": [], "relations": []}` is a real answer: memory is empty.
fn contains_memory_graph(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            let graph = map.get("entities").is_some_and(Value::is_array)
                && map.get("relations").is_some_and(Value::is_array);
            graph || map.values().any(contains_memory_graph)
        }
        Value::Array(items) => items.iter().any(contains_memory_graph),
        Value::String(text) => {
            let trimmed = text.trim();
            trimmed.starts_with('{')
                && serde_json::from_str::<Value>(trimmed)
                    .map(|parsed| contains_memory_graph(&parsed))
                    .unwrap_or(false)
        }
        _ => false,
    }
}

fn has_substance(value: &Value) -> bool {
    match value {
        Value::String(text) => meaningful_text(text),
        Value::Array(items) => items.iter().any(has_substance),
        Value::Object(map) => {
            let zero_count = COUNT_KEYS
                .iter()
                .any(|key| map.get(*key).and_then(Value::as_u64) == Some(0));
            if zero_count && !map.contains_key("file") {
                return false;
            }
            map.iter()
                .filter(|(key, _)| !METADATA_KEYS.contains(&key.as_str()))
                .any(|(_, value)| has_substance(value))
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
    }
}

fn meaningful_text(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    let lowered = trimmed.to_lowercase();
    let lowered = lowered.trim_end_matches('.');
    if EMPTY_LITERALS.contains(&lowered) {
        return false;
    }
    let short = lowered.chars().count() <= SHORT_RESPONSE_CHARS;
    !(short && EMPTY_PHRASES.iter().any(|phrase| lowered.contains(phrase)))
}
