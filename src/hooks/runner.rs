use super::{HookError, HookEvent, HookPayload, HookResponse};
use crate::audit::{AuditOutcome, SessionAuditor, StopInput};
use crate::breaker::BreakerPolicy;
use crate::config::{load_settings, HookPaths, RuntimeEnv, Settings};
use crate::gate::{GateDecision, Gatekeeper};
use crate::outcome::{OutcomeReport, OutcomeTracker};
use crate::prompt::{classify_value, requested_requirements, PromptClassification, PromptKind};
use crate::security::PathFilter;
use crate::shared::clock::now_rfc3339;
use crate::shared::logging::HookLog;
use crate::state::{PromptAnnotation, RequirementKind, SessionState, StateStore};
use crate::tools::ToolCall;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct HookContext {
    pub env: RuntimeEnv,
    pub paths: HookPaths,
    pub settings: Settings,
    pub log: HookLog,
    pub store: StateStore,
}

impl HookContext {
    pub fn prepare(env: RuntimeEnv, payload_cwd: Option<&Path>) -> Result<Self, HookError> {
        let paths = HookPaths::resolve(&env, payload_cwd)?;
        let settings = load_settings(&paths)?;
        let log = if env.test_mode {
            HookLog::disabled()
        } else {
            HookLog::new(paths.log_file())
        };
        let store = StateStore::open(&paths, &settings, env.test_mode, log.clone())?;
        Ok(Self {
            env,
            paths,
            settings,
            log,
            store,
        })
    }

    pub fn gatekeeper(&self) -> Gatekeeper {
        Gatekeeper::from_settings(self.env.home.clone(), &self.settings)
            .with_project_root(self.paths.project_dir())
    }

    pub fn tracker(&self) -> OutcomeTracker {
        OutcomeTracker::new(
            BreakerPolicy::from(&self.settings.breaker),
            PathFilter::from_settings(self.env.home.clone(), &self.settings.paths),
        )
    }

    pub fn auditor(&self) -> SessionAuditor {
        SessionAuditor::new(self.settings.audit.clone())
    }
}

pub fn run_hook(event: HookEvent, stdin: &str, env: RuntimeEnv) -> HookResponse {
    let payload = match HookPayload::parse(stdin) {
        Ok(payload) => payload,
        Err(err) if event == HookEvent::PreTool => {
            return HookResponse::block(format!("saneprocess: {err}; refusing the tool call"))
        }
        Err(err) => {
            return HookResponse::allow_with_warning(format!(
                "saneprocess: {err}; ignoring {} event",
                event.as_str()
            ))
        }
    };

    let payload_cwd = payload.cwd.as_deref().map(PathBuf::from);
    let context = match HookContext::prepare(env.clone(), payload_cwd.as_deref()) {
        Ok(context) => context,
        Err(err) => return without_state(event, &payload, &env, &err),
    };

    match event {
        HookEvent::SessionStart => session_start(&context, &payload),
        HookEvent::Prompt => prompt(&context, &payload),
        HookEvent::PreTool => pre_tool(&context, &payload),
        HookEvent::PostTool => post_tool(&context, &payload),
        HookEvent::Stop => stop(&context, &payload),
    }
}

// No usable state: path and bypass checks still run, mutations are refused.
fn without_state(
    event: HookEvent,
    payload: &HookPayload,
    env: &RuntimeEnv,
    err: &HookError,
) -> HookResponse {
    if event != HookEvent::PreTool {
        return HookResponse::allow_with_warning(format!(
            "saneprocess: state unavailable ({err}); {} event not recorded",
            event.as_str()
        ));
    }
    let call = ToolCall::from_payload(payload.tool_name.as_deref(), payload.tool_input.as_ref());
    let gate = Gatekeeper::from_settings(env.home.clone(), &Settings::default())
        .with_project_root(env.project_dir.as_deref());
    let classified = gate.classify(&call);
    if gate.needs_transaction(&call, &classified) {
        return HookResponse::block(format!(
            "saneprocess blocked {}: state unavailable ({err}); mutating tools are denied",
            call.name
        ));
    }
    let mut scratch = SessionState::default();
    let decision = gate.evaluate(&call, &classified, &mut scratch, &now_rfc3339());
    gate_response(&call, &decision)
}

fn session_start(context: &HookContext, payload: &HookPayload) -> HookResponse {
    let now = now_rfc3339();
    let result = context.store.transact(|state| {
        state.reset_session(&now, payload.session_id.clone());
        state.circuit_breaker.clone()
    });
    match result {
        Ok(breaker) => {
            context.log.info(
                "session.start",
                &format!(
                    "session_id={} breaker_tripped={}",
                    payload.session_id.as_deref().unwrap_or("-"),
                    breaker.tripped
                ),
            );
            if breaker.tripped {
                HookResponse::allow_with_context(format!(
                    "saneprocess: circuit breaker is still tripped ({}); mutating tools stay blocked until a human resets it",
                    breaker.last_trip_reason.as_deref().unwrap_or("repeated failures")
                ))
            } else {
                HookResponse::allow()
            }
        }
        Err(err) => {
            context
                .log
                .error("session.start_failed", &err.to_string());
            HookResponse::allow_with_warning(format!("saneprocess: session reset failed: {err}"))
        }
    }
}

fn prompt(context: &HookContext, payload: &HookPayload) -> HookResponse {
    let value = payload.prompt.clone().unwrap_or(Value::Null);
    let classification = classify_value(&value);
    let requested = requested_requirements(&classification, value.as_str().unwrap_or_default());
    for warning in &classification.warnings {
        context.log.warn("prompt.input", warning);
    }

    let result = context.store.transact(|state| {
        state.prompt = PromptAnnotation {
            last_kind: Some(classification.kind),
            triggers: classification.triggers.clone(),
            frustration: classification.frustration,
        };
        if classification.kind == PromptKind::BigTask {
            state.is_big_task = true;
        }
        for requirement in &requested {
            state.requirements.request(*requirement);
        }
    });
    if let Err(err) = result {
        context
            .log
            .error("prompt.unrecorded", &format!("kind={} error={err}", classification.kind));
    }
    context.log.info(
        "prompt.classified",
        &format!(
            "kind={} triggers={} frustration={} requested={}",
            classification.kind,
            join(classification.triggers.iter()),
            classification.frustration,
            join(requested.iter())
        ),
    );

    match render_prompt_context(&classification, &requested) {
        Some(text) => HookResponse::allow_with_context(text),
        None => HookResponse::allow(),
    }
}

fn render_prompt_context(
    classification: &PromptClassification,
    requested: &BTreeSet<RequirementKind>,
) -> Option<String> {
    if classification.kind == PromptKind::Passthrough && classification.triggers.is_empty() {
        return None;
    }
    let mut lines = vec![format!("saneprocess: request classified as {}", classification.kind)];
    if !classification.triggers.is_empty() {
        lines.push(format!(
            "triggers: {} (small-sounding requests still need research before edits)",
            join(classification.triggers.iter())
        ));
    }
    if classification.frustration {
        lines.push("user frustration detected: re-read the previous request before acting".to_string());
    }
    for requirement in requested {
        lines.push(format!("requirement `{requirement}`: {}", requirement.remedy()));
    }
    Some(lines.join("\n"))
}

fn pre_tool(context: &HookContext, payload: &HookPayload) -> HookResponse {
    let call = ToolCall::from_payload(payload.tool_name.as_deref(), payload.tool_input.as_ref());
    if call.name.is_empty() {
        return HookResponse::block("saneprocess: pre-tool payload has no tool_name");
    }
    let gate = context.gatekeeper();
    let classified = gate.classify(&call);
    let now = now_rfc3339();

    let decision = if gate.needs_transaction(&call, &classified) {
        context
            .store
            .transact(|state| gate.evaluate(&call, &classified, state, &now))
            .unwrap_or_else(|err| {
                context.log.error(
                    "gate.state_unavailable",
                    &format!("tool={} error={err}", call.name),
                );
                GateDecision::unavailable(
                    classified.kind,
                    format!("state could not be updated ({err}); mutating tools are denied until it can"),
                )
            })
    } else {
        let mut snapshot = context.store.snapshot().unwrap_or_else(|err| {
            context
                .log
                .warn("gate.snapshot_failed", &format!("tool={} error={err}", call.name));
            SessionState::default()
        });
        let decision = gate.evaluate(&call, &classified, &mut snapshot, &now);
        if decision.is_block() {
            let recorded = context.store.transact(|state| {
                state.record_violation(&call.name, decision.rule.as_str(), &decision.reason, &now)
            });
            if let Err(err) = recorded {
                context.log.warn(
                    "gate.violation_unrecorded",
                    &format!("tool={} error={err}", call.name),
                );
            }
        }
        decision
    };

    let message = format!(
        "tool={} kind={} rule={} reason={}",
        call.name,
        decision.kind,
        decision.rule.as_str(),
        decision.reason
    );
    if decision.is_block() {
        context.log.warn("gate.block", &message);
    } else {
        context.log.info("gate.allow", &message);
    }
    gate_response(&call, &decision)
}

fn gate_response(call: &ToolCall, decision: &GateDecision) -> HookResponse {
    if decision.is_block() {
        HookResponse::block(format!("saneprocess blocked {}: {}", call.name, decision.reason))
    } else {
        HookResponse::allow()
    }
}

fn post_tool(context: &HookContext, payload: &HookPayload) -> HookResponse {
    let call = ToolCall::from_payload(payload.tool_name.as_deref(), payload.tool_input.as_ref());
    if call.name.is_empty() {
        return HookResponse::allow_with_warning("saneprocess: post-tool payload has no tool_name");
    }
    let response = payload.tool_response.clone().unwrap_or(Value::Null);
    let tracker = context.tracker();
    let now = now_rfc3339();

    let report = match context
        .store
        .transact(|state| tracker.record(&call, &response, payload.is_error, state, &now))
    {
        Ok(report) => report,
        Err(err) => {
            context.log.error(
                "outcome.unrecorded",
                &format!("tool={} error={err}", call.name),
            );
            return HookResponse::allow_with_warning(format!(
                "saneprocess: outcome of {} not recorded: {err}",
                call.name
            ));
        }
    };
    log_outcome(context, &call, &report);

    match report.tripped() {
        Some(signature) => HookResponse::allow_with_context(format!(
            "saneprocess: circuit breaker tripped ({signature}). Mutating tools are blocked until a human resets it; research the failure instead of retrying"
        )),
        None => HookResponse::allow(),
    }
}

fn log_outcome(context: &HookContext, call: &ToolCall, report: &OutcomeReport) {
    if let Some(failure) = &report.failure {
        context.log.warn(
            "outcome.failure",
            &format!(
                "tool={} signature={} evidence={}",
                call.name, failure.signature, failure.evidence
            ),
        );
    }
    if let Some(signature) = report.tripped() {
        context.log.error(
            "breaker.tripped",
            &format!("tool={} signature={signature}", call.name),
        );
    }
    if let Some(category) = report.research {
        context
            .log
            .info("research.satisfied", &format!("tool={} category={category}", call.name));
    }
    if !report.satisfied.is_empty() {
        context.log.info(
            "requirement.satisfied",
            &format!("tool={} requirements={}", call.name, join(report.satisfied.iter())),
        );
    }
}

fn stop(context: &HookContext, payload: &HookPayload) -> HookResponse {
    let input = StopInput {
        summary: payload
            .summary
            .clone()
            .or_else(|| read_summary_file(context)),
        compliance_score: payload.compliance_score(),
        reported_violations: payload.reported_violations(),
        stop_hook_active: payload.stop_hook_active.unwrap_or(false),
    };
    let auditor = context.auditor();
    let now = now_rfc3339();

    let outcome = match context.store.transact(|state| {
        let outcome = auditor.audit(&input, state);
        auditor.finalize(&outcome, state, &now);
        outcome
    }) {
        Ok(outcome) => outcome,
        Err(err) => {
            context.log.error("audit.unrecorded", &err.to_string());
            return HookResponse::allow_with_warning(format!(
                "saneprocess: session audit skipped: {err}"
            ));
        }
    };
    stop_response(context, &outcome)
}

fn stop_response(context: &HookContext, outcome: &AuditOutcome) -> HookResponse {
    let score = outcome
        .score
        .map(|score| score.to_string())
        .unwrap_or_else(|| "-".to_string());
    if outcome.is_blocked() {
        context.log.warn(
            "audit.block_stop",
            &format!("score={score} reasons={}", outcome.reasons.join(" | ")),
        );
        let mut lines = vec!["saneprocess: session summary rejected".to_string()];
        lines.extend(outcome.reasons.iter().map(|reason| format!("- {reason}")));
        return HookResponse::block(lines.join("\n"));
    }
    context.log.info(
        "audit.allow_stop",
        &format!("score={score} warnings={}", outcome.warnings.len()),
    );
    if outcome.warnings.is_empty() {
        HookResponse::allow()
    } else {
        let mut lines = vec!["saneprocess: session audit warnings".to_string()];
        lines.extend(outcome.warnings.iter().map(|warning| format!("- {warning}")));
        HookResponse::allow_with_context(lines.join("\n"))
    }
}

fn read_summary_file(context: &HookContext) -> Option<String> {
    let configured = context.settings.audit.summary_file.as_deref()?;
    let path = Path::new(configured);
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        context.paths.project_dir()?.join(path)
    };
    fs::read_to_string(path).ok()
}

fn join<T: std::fmt::Display>(items: impl Iterator<Item = T>) -> String {
    let joined: Vec<String> = items.map(|item| item.to_string()).collect();
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined.join(",")
    }
}
