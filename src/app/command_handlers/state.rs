use crate::app::command_support::{open_context, required_arg};
use crate::config::RuntimeEnv;
use crate::shared::clock::now_rfc3339;
use crate::state::{LoadStatus, RequirementKind};
use serde_json::json;

pub fn cmd_status(env: &RuntimeEnv) -> Result<String, String> {
    let context = open_context(env)?;
    let loaded = context.store.load().map_err(|e| e.to_string())?;
    let state = &loaded.state;
    let load_status = match loaded.status {
        LoadStatus::Fresh => "fresh".to_string(),
        LoadStatus::Loaded => "loaded".to_string(),
        LoadStatus::RecoveredCorrupt => "recovered_corrupt".to_string(),
        LoadStatus::IntegrityRejected(status) => format!("integrity_rejected:{status:?}").to_lowercase(),
    };
    let missing: Vec<&str> = state.research.missing().iter().map(|c| c.as_str()).collect();
    let summary = json!({
        "stateFile": context.store.state_file().display().to_string(),
        "load": load_status,
        "version": state.version,
        "session": state.session,
        "research": {
            "satisfied": state.research.satisfied_count(),
            "missing": missing,
        },
        "requirements": state.requirements,
        "circuitBreaker": state.circuit_breaker,
        "edits": {
            "count": state.edits.count,
            "uniqueFiles": state.edits.unique_files.len(),
        },
        "isBigTask": state.is_big_task,
        "saneloopActive": state.saneloop.active,
        "violations": state.violations.len(),
        "audit": state.audit,
    });
    serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())
}

pub fn cmd_reset_breaker(env: &RuntimeEnv) -> Result<String, String> {
    let context = open_context(env)?;
    let was_tripped = context
        .store
        .transact(|state| {
            let was_tripped = state.circuit_breaker.tripped;
            state.circuit_breaker.reset();
            was_tripped
        })
        .map_err(|e| e.to_string())?;
    context
        .log
        .info("breaker.reset", &format!("was_tripped={was_tripped}"));
    Ok(format!("breaker reset\nwas_tripped={was_tripped}"))
}

pub fn cmd_reset_session(env: &RuntimeEnv) -> Result<String, String> {
    let context = open_context(env)?;
    let now = now_rfc3339();
    let breaker_tripped = context
        .store
        .transact(|state| {
            state.reset_session(&now, None);
            state.circuit_breaker.tripped
        })
        .map_err(|e| e.to_string())?;
    context.log.info("session.reset", "source=cli");
    Ok(format!("session reset\nbreaker_tripped={breaker_tripped}"))
}

pub fn cmd_require(args: &[String], env: &RuntimeEnv) -> Result<String, String> {
    let usage = "require <saneloop|plan|bug_note|verify>";
    let kind = RequirementKind::parse(required_arg(args, usage)?)?;
    let context = open_context(env)?;
    let already_satisfied = context
        .store
        .transact(|state| {
            state.requirements.request(kind);
            state.requirements.is_satisfied(kind)
        })
        .map_err(|e| e.to_string())?;
    context
        .log
        .info("requirement.requested", &format!("kind={kind} source=cli"));
    Ok(format!(
        "requirement requested\nkind={kind}\nsatisfied={already_satisfied}"
    ))
}
