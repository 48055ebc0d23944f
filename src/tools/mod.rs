use crate::security::{BypassDetector, BypassReport};
use serde::Serialize;
use serde_json::{Map, Value};

const PATH_KEYS: &[&str] = &["filepath", "path", "notebookpath", "targetfile", "file"];
const COMMAND_KEYS: &[&str] = &["command", "cmd"];

const STRUCTURED_EDIT_TOOLS: &[&str] = &["edit", "multiedit", "write", "notebookedit"];

const BOOTSTRAP_TOOLS: &[&str] = &[
    "todowrite",
    "todoread",
    "exitplanmode",
    "enterplanmode",
    "askuserquestion",
    "skill",
    "slashcommand",
    "bashoutput",
    "killshell",
    "killbash",
];

const MEMORY_WRITE_TOOLS: &[&str] = &[
    "create_entities",
    "add_observations",
    "create_relations",
    "delete_observations",
    "delete_entities",
    "delete_relations",
];

const MUTATING_NAME_WORDS: &[&str] = &[
    "write", "edit", "create", "delete", "update", "push", "merge", "remove", "fork", "move",
];

const REMOTE_NAME_WORDS: &[&str] = &["push", "merge", "fork", "create", "delete", "update"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Bootstrap,
    ReadLike,
    MutatingEdit,
    MutatingBash,
    DestructiveRemote,
}

impl ToolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bootstrap => "bootstrap",
            Self::ReadLike => "read_like",
            Self::MutatingEdit => "mutating_edit",
            Self::MutatingBash => "mutating_bash",
            Self::DestructiveRemote => "destructive_remote",
        }
    }

    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Self::MutatingEdit | Self::MutatingBash | Self::DestructiveRemote
        )
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub input: Value,
    pub paths: Vec<String>,
    pub command: Option<String>,
}

impl ToolCall {
    pub fn new(name: &str, input: Value) -> Self {
        let name = name.trim().to_string();
        let mut paths = Vec::new();
        let mut command = None;
        if let Value::Object(map) = &input {
            for (key, value) in map {
                let key = normalize_key(key);
                let Some(text) = value.as_str().filter(|text| !text.trim().is_empty()) else {
                    continue;
                };
                if PATH_KEYS.contains(&key.as_str()) {
                    paths.push(text.to_string());
                } else if COMMAND_KEYS.contains(&key.as_str()) && command.is_none() {
                    command = Some(text.to_string());
                }
            }
            if normalize_key(&name) == "glob" {
                if let Some(pattern) = string_field(map, "pattern") {
                    paths.push(pattern);
                }
            }
        }
        Self {
            name,
            input,
            paths,
            command,
        }
    }

    pub fn from_payload(name: Option<&str>, input: Option<&Value>) -> Self {
        Self::new(
            name.unwrap_or_default(),
            input.cloned().unwrap_or(Value::Null),
        )
    }

    pub fn normalized_name(&self) -> String {
        normalize_key(&self.name)
    }

    pub fn primary_path(&self) -> Option<&str> {
        self.paths.first().map(String::as_str)
    }

    pub fn is_shell(&self) -> bool {
        self.normalized_name() == "bash"
    }

    pub fn is_structured_edit(&self) -> bool {
        STRUCTURED_EDIT_TOOLS.contains(&self.normalized_name().as_str())
    }

    pub fn mcp_parts(&self) -> Option<(&str, &str)> {
        let rest = self.name.strip_prefix("mcp__")?;
        rest.split_once("__")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedCall {
    pub kind: ToolKind,
    pub bypass: Option<BypassReport>,
}

pub fn classify(call: &ToolCall, detector: &BypassDetector) -> ClassifiedCall {
    if call.is_shell() {
        let Some(command) = call.command.as_deref() else {
            return ClassifiedCall {
                kind: ToolKind::ReadLike,
                bypass: None,
            };
        };
        let report = detector.inspect(command);
        let kind = if report.remote {
            ToolKind::DestructiveRemote
        } else if report.mutating || report.decision.is_block() {
            ToolKind::MutatingBash
        } else {
            ToolKind::ReadLike
        };
        return ClassifiedCall {
            kind,
            bypass: Some(report),
        };
    }

    ClassifiedCall {
        kind: classify_name(call),
        bypass: None,
    }
}

fn classify_name(call: &ToolCall) -> ToolKind {
    let name = call.normalized_name();
    if call.is_structured_edit() {
        return ToolKind::MutatingEdit;
    }
    if BOOTSTRAP_TOOLS.contains(&name.as_str()) {
        return ToolKind::Bootstrap;
    }
    if let Some((server, operation)) = call.mcp_parts() {
        let operation = operation.to_ascii_lowercase();
        if server.eq_ignore_ascii_case("memory") && MEMORY_WRITE_TOOLS.contains(&operation.as_str())
        {
            return ToolKind::DestructiveRemote;
        }
        let remote_server = server.to_ascii_lowercase().contains("git");
        if remote_server && has_name_word(&operation, REMOTE_NAME_WORDS) {
            return ToolKind::DestructiveRemote;
        }
        if has_name_word(&operation, MUTATING_NAME_WORDS) {
            return ToolKind::MutatingEdit;
        }
        return ToolKind::ReadLike;
    }
    if is_known_read_tool(&name) {
        return ToolKind::ReadLike;
    }
    if has_name_word(&call.name.to_ascii_lowercase(), MUTATING_NAME_WORDS) {
        return ToolKind::MutatingEdit;
    }
    ToolKind::ReadLike
}

fn is_known_read_tool(name: &str) -> bool {
    matches!(
        name,
        "read" | "grep" | "glob" | "ls" | "task" | "websearch" | "webfetch" | "notebookread"
    )
}

fn has_name_word(name: &str, words: &[&str]) -> bool {
    words.iter().any(|word| name.contains(word))
}

// `:file_path`, `filePath`, `FILE-PATH` all normalize to `filepath`.
pub fn normalize_key(key: &str) -> String {
    key.trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
}
