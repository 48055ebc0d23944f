use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::tempdir;

fn run(root: &Path, args: &[&str], stdin: &str) -> Output {
    let project = root.join("project");
    fs::create_dir_all(&project).expect("create project");
    let mut child = Command::new(env!("CARGO_BIN_EXE_saneprocess"))
        .args(args)
        .env("HOME", root.join("home"))
        .env("CLAUDE_PROJECT_DIR", &project)
        .env("SANEPROCESS_SECRET_PATH", root.join("hook_secret"))
        .env("SANEPROCESS_TEST_MODE", "1")
        .env_remove("SANEPROCESS_STATE_DIR")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn saneprocess");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("wait saneprocess")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn pre_tool_hook_exits_with_block_code_and_reason() {
    let dir = tempdir().expect("tempdir");
    let output = run(
        dir.path(),
        &["hook", "pre-tool"],
        r#"{"tool_name":"Edit","tool_input":{"file_path":"src/lib.rs","old_string":"a","new_string":"b"}}"#,
    );
    assert_eq!(output.status.code(), Some(2), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("research incomplete"));
    assert!(dir.path().join("project/.saneprocess/state.json").is_file());
    assert!(dir.path().join("hook_secret").is_file());
}

#[test]
fn read_only_hook_and_malformed_post_tool_exit_zero() {
    let dir = tempdir().expect("tempdir");
    let output = run(
        dir.path(),
        &["hook", "PreToolUse"],
        r#"{"tool_name":"Grep","tool_input":{"pattern":"fn main"}}"#,
    );
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let output = run(dir.path(), &["hook", "post-tool"], "not json");
    assert_eq!(output.status.code(), Some(0));

    let output = run(dir.path(), &["hook", "pre-tool"], "not json");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_errors_exit_one() {
    let dir = tempdir().expect("tempdir");
    let output = run(dir.path(), &["hook", "bogus"], "{}");
    assert_eq!(output.status.code(), Some(1));

    let output = run(dir.path(), &["launch"], "");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unknown command"));

    let output = run(dir.path(), &["status"], "");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("\"circuitBreaker\""));
}
