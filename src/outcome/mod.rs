pub mod failure;
pub mod research;

pub use failure::{detect_failure, Failure};
pub use research::{category_for, is_meaningful};

use crate::breaker::{BreakerPolicy, BreakerTransition, ErrorSignature};
use crate::security::{shell_words, PathFilter};
use crate::state::{RequirementKind, ResearchCategory, SessionState};
use crate::tools::ToolCall;
use serde_json::Value;

const VERIFY_COMMANDS: &[&str] = &[
    "cargo test",
    "cargo build",
    "swift test",
    "swift build",
    "xcodebuild test",
    "xcodebuild build",
    "npm test",
    "npm run test",
    "yarn test",
    "pnpm test",
    "go test",
    "pytest",
    "rspec",
    "rake test",
    "make test",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeReport {
    pub failure: Option<Failure>,
    pub breaker: BreakerTransition,
    pub research: Option<ResearchCategory>,
    pub edited: Option<String>,
    pub satisfied: Vec<RequirementKind>,
}

#[derive(Debug, Clone)]
pub struct OutcomeTracker {
    policy: BreakerPolicy,
    filter: PathFilter,
}

impl OutcomeTracker {
    pub fn new(policy: BreakerPolicy, filter: PathFilter) -> Self {
        Self { policy, filter }
    }

    pub fn record(
        &self,
        call: &ToolCall,
        response: &Value,
        top_level_error: Option<bool>,
        state: &mut SessionState,
        now: &str,
    ) -> OutcomeReport {
        if let Some(failure) = detect_failure(call, response, top_level_error) {
            let breaker = state
                .circuit_breaker
                .record_failure(failure.signature, self.policy, now);
            return OutcomeReport {
                failure: Some(failure),
                breaker,
                research: None,
                edited: None,
                satisfied: Vec::new(),
            };
        }

        let breaker = state.circuit_breaker.record_success();

        let research = category_for(call).filter(|category| is_meaningful(*category, response));
        if let Some(category) = research {
            state.research.mark(category);
        }

        let edited = if call.is_structured_edit() {
            let path = call.primary_path().map(|raw| self.canonical(raw));
            state.edits.record(path.as_deref());
            Some(path.unwrap_or_default())
        } else {
            None
        };

        let satisfied = satisfied_by_outcome(call);
        for requirement in &satisfied {
            state.requirements.satisfy(*requirement);
        }

        OutcomeReport {
            failure: None,
            breaker,
            research,
            edited,
            satisfied,
        }
    }

    fn canonical(&self, raw: &str) -> String {
        self.filter
            .canonicalize(raw)
            .map(|canonical| canonical.text)
            .unwrap_or_else(|| raw.to_string())
    }
}

impl OutcomeReport {
    pub fn tripped(&self) -> Option<ErrorSignature> {
        match (&self.breaker, &self.failure) {
            (BreakerTransition::Tripped(_), Some(failure)) => Some(failure.signature),
            _ => None,
        }
    }
}

fn satisfied_by_outcome(call: &ToolCall) -> Vec<RequirementKind> {
    if let Some((server, operation)) = call.mcp_parts() {
        let writes_memory = server.eq_ignore_ascii_case("memory")
            && matches!(operation, "create_entities" | "add_observations");
        return if writes_memory {
            vec![RequirementKind::BugNote]
        } else {
            Vec::new()
        };
    }
    match call.command.as_deref().filter(|_| call.is_shell()) {
        Some(command) if runs_verification(command) => vec![RequirementKind::Verify],
        _ => Vec::new(),
    }
}

fn runs_verification(command: &str) -> bool {
    let parsed = shell_words::parse(command);
    parsed.commands.iter().any(|simple| {
        let Some(index) = simple.program_index() else {
            return false;
        };
        let words: Vec<&str> = simple.words[index..]
            .iter()
            .map(|word| shell_words::basename(word))
            .filter(|word| !word.starts_with('-'))
            .collect();
        let spaced = format!(" {} ", words.join(" "));
        VERIFY_COMMANDS
            .iter()
            .any(|verify| spaced.contains(&format!(" {verify} ")))
            || words.iter().any(|word| word.contains("verify"))
    })
}
