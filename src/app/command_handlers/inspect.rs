use crate::app::command_support::{joined_args, load_inspection_settings, required_arg};
use crate::config::{resolve_project_dir, RuntimeEnv};
use crate::prompt::{classify, requested_requirements};
use crate::security::{BypassDetector, PathFilter};

pub fn cmd_classify(args: &[String]) -> Result<String, String> {
    let text = args.join(" ");
    let classification = classify(&text);
    let requested = requested_requirements(&classification, &text);
    let triggers: Vec<&str> = classification.triggers.iter().map(String::as_str).collect();
    let requested: Vec<&str> = requested.iter().map(|kind| kind.as_str()).collect();
    Ok(format!(
        "kind={}\ntriggers={}\nfrustration={}\nrequested={}",
        classification.kind,
        list_or_none(&triggers),
        classification.frustration,
        list_or_none(&requested)
    ))
}

pub fn cmd_check_path(args: &[String], env: &RuntimeEnv) -> Result<String, String> {
    let raw = required_arg(args, "check-path <path>")?;
    let settings = load_inspection_settings(env)?;
    let filter = PathFilter::from_settings(env.home.clone(), &settings.paths);
    let check = filter.check_path(raw);
    Ok(format!(
        "verdict={}\nreason={}\ncanonical={}\ntraversal={}",
        check.decision.verdict, check.decision.reason, check.canonical, check.traversal
    ))
}

pub fn cmd_check_command(args: &[String], env: &RuntimeEnv) -> Result<String, String> {
    let command = joined_args(args, "check-command <command>")?;
    let settings = load_inspection_settings(env)?;
    let filter = PathFilter::from_settings(env.home.clone(), &settings.paths);
    let detector = BypassDetector::from_settings(env.home.clone(), &settings.paths)
        .with_project_root(resolve_project_dir(env, None).ok().as_deref());

    let report = detector.inspect(&command);
    let path_decision = filter.check_command(&command);
    let decision = if path_decision.is_block() {
        path_decision
    } else {
        report.decision.clone()
    };
    Ok(format!(
        "verdict={}\nreason={}\nmutating={}\nremote={}",
        decision.verdict, decision.reason, report.mutating, report.remote
    ))
}

fn list_or_none(items: &[&str]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(",")
    }
}
