use saneprocess::app::command_handlers::{hook::cmd_hook, run_cli_with_env};
use saneprocess::config::RuntimeEnv;
use saneprocess::hooks::HookContext;
use serde_json::{json, Value};
use std::fs;
use tempfile::tempdir;

fn env_for(root: &std::path::Path) -> RuntimeEnv {
    let project = root.join("project");
    fs::create_dir_all(&project).expect("create project");
    RuntimeEnv {
        test_mode: true,
        home: Some(root.join("home")),
        project_dir: Some(project.clone()),
        state_dir: None,
        secret_path: Some(root.join("hook_secret")),
        current_dir: Some(project),
    }
}

fn cli(env: &RuntimeEnv, args: &[&str]) -> Result<String, String> {
    run_cli_with_env(args.iter().map(|arg| arg.to_string()).collect(), env)
}

#[test]
fn help_and_unknown_commands() {
    let dir = tempdir().expect("tempdir");
    let env = env_for(dir.path());
    assert!(cli(&env, &[]).expect("help").contains("reset-breaker"));
    assert!(cli(&env, &["help"]).expect("help").contains("check-command"));
    let err = cli(&env, &["frobnicate"]).expect_err("unknown");
    assert!(err.contains("unknown command `frobnicate`"));
    assert!(cli(&env, &["hook", "pre-tool"]).is_err());
}

#[test]
fn classify_reports_kind_and_triggers() {
    let dir = tempdir().expect("tempdir");
    let env = env_for(dir.path());
    let out = cli(&env, &["classify", "quick", "question", "about", "the", "fix"]).expect("classify");
    assert!(out.contains("kind=question"), "{out}");
    assert!(out.contains("triggers=quick"), "{out}");

    let out = cli(&env, &["classify", "fix everything in the module"]).expect("classify");
    assert!(out.contains("kind=big_task"), "{out}");
    assert!(out.contains("requested=plan"), "{out}");

    let out = cli(&env, &["classify"]).expect("classify empty");
    assert!(out.contains("kind=passthrough"), "{out}");
}

#[test]
fn check_path_and_check_command_report_verdicts() {
    let dir = tempdir().expect("tempdir");
    let env = env_for(dir.path());

    let out = cli(&env, &["check-path", "~/.ssh/id_rsa"]).expect("check-path");
    assert!(out.contains("verdict=block"), "{out}");

    let out = cli(&env, &["check-path", "src/../../etc/passwd"]).expect("check-path");
    assert!(out.contains("traversal=true"), "{out}");

    let out = cli(&env, &["check-path", "src/main.rs"]).expect("check-path");
    assert!(out.contains("verdict=allow"), "{out}");

    let out = cli(&env, &["check-command", "cat ~/.aws/credentials"]).expect("check-command");
    assert!(out.contains("verdict=block"), "{out}");

    let out = cli(&env, &["check-command", "git", "push", "origin", "main"]).expect("check-command");
    assert!(out.contains("verdict=allow"), "{out}");
    assert!(out.contains("remote=true"), "{out}");

    let out = cli(&env, &["check-command", "ls", "-la"]).expect("check-command");
    assert!(out.contains("mutating=false"), "{out}");

    assert!(cli(&env, &["check-path"]).is_err());
    assert!(cli(&env, &["check-command"]).is_err());
}

#[test]
fn require_status_and_resets_go_through_the_signed_store() {
    let dir = tempdir().expect("tempdir");
    let env = env_for(dir.path());

    let out = cli(&env, &["require", "verify"]).expect("require");
    assert!(out.contains("kind=verify"), "{out}");
    assert!(out.contains("satisfied=false"), "{out}");
    assert!(cli(&env, &["require", "nonsense"]).is_err());
    assert!(cli(&env, &["require"]).is_err());

    let status: Value =
        serde_json::from_str(&cli(&env, &["status"]).expect("status")).expect("status json");
    assert_eq!(status["load"], json!("loaded"));
    assert_eq!(status["requirements"]["requested"], json!(["verify"]));
    assert_eq!(status["research"]["satisfied"], json!(0));
    assert_eq!(status["circuitBreaker"]["tripped"], json!(false));

    let context = HookContext::prepare(env.clone(), None).expect("context");
    context
        .store
        .transact(|state| state.circuit_breaker.trip("test trip", "2026-01-01T00:00:00Z"))
        .expect("trip");

    let out = cli(&env, &["reset-session"]).expect("reset-session");
    assert!(out.contains("breaker_tripped=true"), "{out}");
    let state = context.store.snapshot().expect("snapshot");
    assert!(state.requirements.requested.is_empty());
    assert!(state.circuit_breaker.tripped);

    let out = cli(&env, &["reset-breaker"]).expect("reset-breaker");
    assert!(out.contains("was_tripped=true"), "{out}");
    assert!(!context.store.snapshot().expect("snapshot").circuit_breaker.tripped);
}

#[test]
fn hook_command_validates_the_event_name() {
    let dir = tempdir().expect("tempdir");
    let env = env_for(dir.path());
    assert!(cmd_hook(&[], "{}", env.clone()).is_err());
    assert!(cmd_hook(&["pre_tool".to_string()], "{}", env.clone()).is_err());

    let response = cmd_hook(
        &["PreToolUse".to_string()],
        r#"{"tool_name":"Read","tool_input":{"file_path":"~/.netrc"}}"#,
        env,
    )
    .expect("hook");
    assert!(response.is_block());
}
