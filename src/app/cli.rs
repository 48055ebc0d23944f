#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Hook,
    Status,
    ResetBreaker,
    ResetSession,
    Require,
    Classify,
    CheckPath,
    CheckCommand,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "hook" => CliVerb::Hook,
        "status" => CliVerb::Status,
        "reset-breaker" => CliVerb::ResetBreaker,
        "reset-session" => CliVerb::ResetSession,
        "require" => CliVerb::Require,
        "classify" => CliVerb::Classify,
        "check-path" => CliVerb::CheckPath,
        "check-command" => CliVerb::CheckCommand,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Commands:".to_string(),
        "  hook <event>                         Run a hook (session-start|prompt|pre-tool|post-tool|stop) on stdin JSON"
            .to_string(),
        "  status                               Print a JSON summary of the session state".to_string(),
        "  reset-breaker                        Reset a tripped circuit breaker".to_string(),
        "  reset-session                        Start a fresh session (breaker is kept)".to_string(),
        "  require <kind>                       Request a requirement (saneloop|plan|bug_note|verify)"
            .to_string(),
        "  classify <text>                      Print how a prompt would be classified".to_string(),
        "  check-path <path>                    Check a path against the sensitive-path filter"
            .to_string(),
        "  check-command <command>              Check a shell command for sensitive paths and write bypasses"
            .to_string(),
        "  help                                 Show this help".to_string(),
    ]
}

pub(crate) fn help_text() -> String {
    let mut lines = vec!["saneprocess: process-enforcement hooks for coding agents".to_string()];
    lines.push(String::new());
    lines.extend(cli_help_lines());
    lines.join("\n")
}
