use super::HookError;
use serde::Deserialize;
use serde_json::Value;

pub const EXIT_ALLOW: i32 = 0;
pub const EXIT_BLOCK: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    SessionStart,
    Prompt,
    PreTool,
    PostTool,
    Stop,
}

impl HookEvent {
    pub fn parse(raw: &str) -> Result<Self, HookError> {
        match raw.trim() {
            "session-start" | "SessionStart" => Ok(Self::SessionStart),
            "prompt" | "UserPromptSubmit" => Ok(Self::Prompt),
            "pre-tool" | "PreToolUse" => Ok(Self::PreTool),
            "post-tool" | "PostToolUse" => Ok(Self::PostTool),
            "stop" | "Stop" => Ok(Self::Stop),
            other => Err(HookError::UnknownEvent(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionStart => "session-start",
            Self::Prompt => "prompt",
            Self::PreTool => "pre-tool",
            Self::PostTool => "post-tool",
            Self::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HookPayload {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<Value>,
    #[serde(default, alias = "tool_result")]
    pub tool_response: Option<Value>,
    #[serde(default)]
    pub is_error: Option<bool>,
    #[serde(default, alias = "user_prompt")]
    pub prompt: Option<Value>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub compliance_score: Option<Value>,
    #[serde(default)]
    pub violations: Option<Value>,
    #[serde(default)]
    pub stop_hook_active: Option<bool>,
}

impl HookPayload {
    pub fn parse(raw: &str) -> Result<Self, HookError> {
        if raw.trim().is_empty() {
            return Err(HookError::EmptyPayload);
        }
        let value: Value = serde_json::from_str(raw).map_err(HookError::Payload)?;
        if !value.is_object() {
            return Err(HookError::PayloadShape(json_type_name(&value)));
        }
        serde_json::from_value(value).map_err(HookError::Payload)
    }

    pub fn compliance_score(&self) -> Option<u8> {
        match self.compliance_score.as_ref()? {
            Value::Number(number) => number.as_u64().and_then(|n| u8::try_from(n).ok()),
            Value::String(text) => text
                .split('/')
                .next()
                .and_then(|score| score.trim().parse().ok()),
            _ => None,
        }
    }

    pub fn reported_violations(&self) -> Option<usize> {
        match self.violations.as_ref()? {
            Value::Array(items) => Some(items.len()),
            Value::Number(number) => number.as_u64().map(|n| n as usize),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookResponse {
    pub exit_code: i32,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl HookResponse {
    pub fn allow() -> Self {
        Self {
            exit_code: EXIT_ALLOW,
            stdout: None,
            stderr: None,
        }
    }

    pub fn allow_with_context(context: impl Into<String>) -> Self {
        Self {
            stdout: Some(context.into()),
            ..Self::allow()
        }
    }

    pub fn allow_with_warning(warning: impl Into<String>) -> Self {
        Self {
            stderr: Some(warning.into()),
            ..Self::allow()
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            exit_code: EXIT_BLOCK,
            stdout: None,
            stderr: Some(reason.into()),
        }
    }

    pub fn is_block(&self) -> bool {
        self.exit_code == EXIT_BLOCK
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_accepts_field_aliases() {
        let payload = HookPayload::parse(
            r#"{"tool_name":"Bash","tool_input":{"command":"ls"},"tool_result":{"stdout":"a"},"user_prompt":"fix it"}"#,
        )
        .expect("parse");
        assert_eq!(payload.tool_name.as_deref(), Some("Bash"));
        assert_eq!(
            payload.tool_response,
            Some(serde_json::json!({"stdout": "a"}))
        );
        assert_eq!(payload.prompt, Some(Value::String("fix it".to_string())));
    }

    #[test]
    fn malformed_payloads_are_errors() {
        assert!(matches!(HookPayload::parse(""), Err(HookError::EmptyPayload)));
        assert!(matches!(
            HookPayload::parse("{not json"),
            Err(HookError::Payload(_))
        ));
        assert!(matches!(
            HookPayload::parse("[1,2]"),
            Err(HookError::PayloadShape("array"))
        ));
    }

    #[test]
    fn score_and_violation_counts_are_lenient() {
        let payload = HookPayload::parse(
            r#"{"compliance_score":"7/10","violations":["skipped tests"]}"#,
        )
        .expect("parse");
        assert_eq!(payload.compliance_score(), Some(7));
        assert_eq!(payload.reported_violations(), Some(1));

        let payload = HookPayload::parse(r#"{"compliance_score":9,"violations":0}"#).expect("parse");
        assert_eq!(payload.compliance_score(), Some(9));
        assert_eq!(payload.reported_violations(), Some(0));
    }

    #[test]
    fn events_accept_host_names() {
        assert_eq!(HookEvent::parse("PreToolUse").expect("event"), HookEvent::PreTool);
        assert_eq!(HookEvent::parse("stop").expect("event"), HookEvent::Stop);
        assert!(HookEvent::parse("bogus").is_err());
    }
}
