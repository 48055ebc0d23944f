use crate::config::Settings;
use crate::security::shell_words;
use crate::security::{BypassDetector, PathFilter, Verdict};
use crate::state::{RequirementKind, ResearchCategory, SessionState};
use crate::tools::{classify, ClassifiedCall, ToolCall, ToolKind};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateRule {
    CircuitBreaker,
    SensitivePath,
    Bypass,
    Bootstrap,
    Research,
    Requirement(RequirementKind),
    StateUnavailable,
    Allowed,
}

impl GateRule {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CircuitBreaker => "circuit_breaker",
            Self::SensitivePath => "sensitive_path",
            Self::Bypass => "bypass",
            Self::Bootstrap => "bootstrap",
            Self::Research => "research",
            Self::Requirement(kind) => kind.as_str(),
            Self::StateUnavailable => "state_unavailable",
            Self::Allowed => "allowed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateDecision {
    pub verdict: Verdict,
    pub rule: GateRule,
    pub kind: ToolKind,
    pub reason: String,
}

impl GateDecision {
    fn allow(rule: GateRule, kind: ToolKind, reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Allow,
            rule,
            kind,
            reason: reason.into(),
        }
    }

    fn block(rule: GateRule, kind: ToolKind, reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Block,
            rule,
            kind,
            reason: reason.into(),
        }
    }

    pub fn unavailable(kind: ToolKind, reason: impl Into<String>) -> Self {
        Self::block(GateRule::StateUnavailable, kind, reason)
    }

    pub fn is_block(&self) -> bool {
        self.verdict.is_block()
    }
}

#[derive(Debug, Clone)]
pub struct Gatekeeper {
    filter: PathFilter,
    detector: BypassDetector,
}

impl Gatekeeper {
    pub fn new(filter: PathFilter, detector: BypassDetector) -> Self {
        Self { filter, detector }
    }

    pub fn from_settings(home: Option<PathBuf>, settings: &Settings) -> Self {
        Self::new(
            PathFilter::from_settings(home.clone(), &settings.paths),
            BypassDetector::from_settings(home, &settings.paths),
        )
    }

    pub fn with_project_root(mut self, root: Option<&Path>) -> Self {
        self.detector = self.detector.with_project_root(root);
        self
    }

    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    pub fn detector(&self) -> &BypassDetector {
        &self.detector
    }

    pub fn classify(&self, call: &ToolCall) -> ClassifiedCall {
        classify(call, &self.detector)
    }

    pub fn needs_transaction(&self, call: &ToolCall, classified: &ClassifiedCall) -> bool {
        classified.kind.is_mutating() || !satisfied_by(call).is_empty()
    }

    pub fn evaluate(
        &self,
        call: &ToolCall,
        classified: &ClassifiedCall,
        state: &mut SessionState,
        now: &str,
    ) -> GateDecision {
        let satisfies = satisfied_by(call);
        let decision = self.decide(call, classified, state, &satisfies);
        if decision.is_block() {
            state.record_violation(&call.name, decision.rule.as_str(), &decision.reason, now);
            return decision;
        }
        for requirement in satisfies {
            state.requirements.satisfy(requirement);
            if requirement == RequirementKind::Saneloop {
                state.saneloop.active = true;
            }
        }
        decision
    }

    fn decide(
        &self,
        call: &ToolCall,
        classified: &ClassifiedCall,
        state: &SessionState,
        satisfies: &[RequirementKind],
    ) -> GateDecision {
        let kind = classified.kind;

        if state.circuit_breaker.tripped && kind.is_mutating() {
            let cause = state
                .circuit_breaker
                .last_trip_reason
                .as_deref()
                .unwrap_or("repeated failures");
            return GateDecision::block(
                GateRule::CircuitBreaker,
                kind,
                format!(
                    "circuit breaker is tripped ({cause}); {} is blocked until a human resets the breaker. Research the failure with read-only tools meanwhile",
                    call.name
                ),
            );
        }

        for path in &call.paths {
            let check = self.filter.check_path(path);
            if check.decision.is_block() {
                return GateDecision::block(GateRule::SensitivePath, kind, check.decision.reason);
            }
        }
        if let Some(command) = call.command.as_deref() {
            let decision = self.filter.check_command(command);
            if decision.is_block() {
                return GateDecision::block(GateRule::SensitivePath, kind, decision.reason);
            }
        }
        if let Some(report) = &classified.bypass {
            if report.decision.is_block() {
                return GateDecision::block(GateRule::Bypass, kind, report.decision.reason.clone());
            }
        }

        if kind == ToolKind::Bootstrap {
            return GateDecision::allow(GateRule::Bootstrap, kind, "bootstrap tool");
        }

        if matches!(kind, ToolKind::DestructiveRemote | ToolKind::MutatingEdit)
            && !state.research.is_complete()
        {
            return GateDecision::block(GateRule::Research, kind, research_reason(call, state));
        }

        if kind == ToolKind::MutatingEdit {
            let unsatisfied: Vec<RequirementKind> = state
                .requirements
                .unsatisfied()
                .into_iter()
                .filter(|kind| !satisfies.contains(kind))
                .collect();
            if let Some(first) = unsatisfied.first().copied() {
                let names: Vec<&str> = unsatisfied.iter().map(|kind| kind.as_str()).collect();
                return GateDecision::block(
                    GateRule::Requirement(first),
                    kind,
                    format!(
                        "requirement `{first}` was requested but is not satisfied: {}. Unsatisfied: {}",
                        first.remedy(),
                        names.join(", ")
                    ),
                );
            }
        }

        GateDecision::allow(GateRule::Allowed, kind, "allowed")
    }
}

fn research_reason(call: &ToolCall, state: &SessionState) -> String {
    let missing: Vec<String> = state
        .research
        .missing()
        .into_iter()
        .map(|category| format!("{category} ({})", research_hint(category)))
        .collect();
    format!(
        "research incomplete before {} ({}/{} categories): missing {}",
        call.name,
        state.research.satisfied_count(),
        ResearchCategory::ALL.len(),
        missing.join(", ")
    )
}

fn research_hint(category: ResearchCategory) -> &'static str {
    match category {
        ResearchCategory::Memory => "mcp__memory__read_graph or search_nodes",
        ResearchCategory::Docs => "a docs or context7 lookup",
        ResearchCategory::Web => "WebSearch or WebFetch",
        ResearchCategory::Github => "mcp__github__search_* or get_*",
        ResearchCategory::Local => "Read, Grep, Glob or Task",
    }
}

pub fn satisfied_by(call: &ToolCall) -> Vec<RequirementKind> {
    let mut satisfied = Vec::new();
    if let Some(command) = call.command.as_deref().filter(|_| call.is_shell()) {
        if starts_saneloop(command) {
            satisfied.push(RequirementKind::Saneloop);
        }
    }
    if call.is_structured_edit() && call.paths.iter().any(|path| is_plan_file(path)) {
        satisfied.push(RequirementKind::Plan);
    }
    satisfied
}

fn starts_saneloop(command: &str) -> bool {
    shell_words::parse(command).commands.iter().any(|simple| {
        let words = &simple.words;
        words
            .windows(2)
            .any(|pair| shell_words::basename(&pair[0]) == "saneloop" && pair[1] == "start")
    })
}

fn is_plan_file(path: &str) -> bool {
    let name = shell_words::basename(path).to_ascii_lowercase();
    let in_plans_dir = path.to_ascii_lowercase().contains("/plans/");
    name.ends_with(".md") && (name.contains("plan") || in_plans_dir)
}
