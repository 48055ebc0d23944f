use saneprocess::config::RuntimeEnv;
use saneprocess::hooks::{run_hook, HookContext, HookEvent, HookResponse};
use saneprocess::prompt::PromptKind;
use saneprocess::state::{RequirementKind, SessionState};
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::{tempdir, TempDir};

struct Harness {
    _dir: TempDir,
    env: RuntimeEnv,
    project: PathBuf,
}

fn harness() -> Harness {
    let dir = tempdir().expect("tempdir");
    let project = dir.path().join("project");
    let home = dir.path().join("home");
    fs::create_dir_all(project.join("src")).expect("create project");
    fs::create_dir_all(&home).expect("create home");
    let env = RuntimeEnv {
        test_mode: true,
        home: Some(home),
        project_dir: Some(project.clone()),
        state_dir: None,
        secret_path: Some(dir.path().join("hook_secret")),
        current_dir: Some(project.clone()),
    };
    Harness {
        _dir: dir,
        env,
        project,
    }
}

impl Harness {
    fn hook(&self, event: HookEvent, payload: Value) -> HookResponse {
        run_hook(event, &payload.to_string(), self.env.clone())
    }

    fn pre_tool(&self, tool: &str, input: Value) -> HookResponse {
        self.hook(
            HookEvent::PreTool,
            json!({"tool_name": tool, "tool_input": input}),
        )
    }

    fn post_tool(&self, tool: &str, input: Value, response: Value) -> HookResponse {
        self.hook(
            HookEvent::PostTool,
            json!({"tool_name": tool, "tool_input": input, "tool_response": response}),
        )
    }

    fn state(&self) -> SessionState {
        HookContext::prepare(self.env.clone(), None)
            .expect("context")
            .store
            .snapshot()
            .expect("snapshot")
    }

    fn state_file(&self) -> PathBuf {
        self.project.join(".saneprocess/state.json")
    }

    fn source_file(&self) -> String {
        self.project.join("src/main.rs").display().to_string()
    }

    fn edit(&self) -> HookResponse {
        self.pre_tool(
            "Edit",
            json!({"file_path": self.source_file(), "old_string": "a", "new_string": "b"}),
        )
    }

    fn record_edit(&self, path: &str) {
        let response = self.post_tool(
            "Edit",
            json!({"file_path": path, "old_string": "a", "new_string": "b"}),
            json!({"filePath": path, "structuredPatch": []}),
        );
        assert!(!response.is_block());
    }

    fn research_everything(&self) {
        self.post_tool(
            "Read",
            json!({"file_path": self.source_file()}),
            json!({"type": "text", "file": {"filePath": self.source_file(), "content": "fn main() {}"}}),
        );
        self.post_tool(
            "mcp__memory__read_graph",
            json!({}),
            json!({"entities": [], "relations": []}),
        );
        self.post_tool(
            "mcp__context7__get-library-docs",
            json!({"libraryId": "/tokio-rs/axum"}),
            json!("Routers are built with Router::new().route(...)"),
        );
        self.post_tool(
            "WebSearch",
            json!({"query": "axum logout handler"}),
            json!({"results": [{"title": "axum sessions", "url": "https://docs.rs/axum"}]}),
        );
        self.post_tool(
            "mcp__github__search_code",
            json!({"q": "logout repo:acme/app"}),
            json!({"total_count": 1, "items": [{"name": "auth.rs", "html_url": "https://github.com/acme/app"}]}),
        );
    }

    fn fail_build(&self) -> HookResponse {
        self.post_tool(
            "Bash",
            json!({"command": "cargo build"}),
            json!({"stdout": "", "stderr": "error: could not compile `app`", "exit_code": 101}),
        )
    }
}

fn stderr(response: &HookResponse) -> &str {
    response.stderr.as_deref().unwrap_or_default()
}

fn stdout(response: &HookResponse) -> &str {
    response.stdout.as_deref().unwrap_or_default()
}

#[test]
fn edits_are_gated_until_every_research_category_is_met() {
    let h = harness();

    let blocked = h.edit();
    assert!(blocked.is_block());
    assert!(stderr(&blocked).contains("0/5"), "{}", stderr(&blocked));

    h.post_tool(
        "Read",
        json!({"file_path": h.source_file()}),
        json!({"type": "text", "file": {"filePath": h.source_file(), "content": "fn main() {}"}}),
    );
    let blocked = h.edit();
    assert!(blocked.is_block());
    assert!(stderr(&blocked).contains("1/5"), "{}", stderr(&blocked));
    assert!(stderr(&blocked).contains("memory"));

    h.research_everything();
    let allowed = h.edit();
    assert!(!allowed.is_block(), "{}", stderr(&allowed));

    h.record_edit(&h.source_file());
    let state = h.state();
    assert_eq!(state.edits.count, 1);
    assert_eq!(state.violations.len(), 2);
    assert!(state.research.is_complete());
}

#[test]
fn empty_research_results_do_not_count() {
    let h = harness();
    h.post_tool(
        "Grep",
        json!({"pattern": "logout"}),
        json!({"mode": "files_with_matches", "filenames": [], "numFiles": 0}),
    );
    h.post_tool(
        "WebSearch",
        json!({"query": "x"}),
        json!("No results found for query: x"),
    );
    assert_eq!(h.state().research.satisfied_count(), 0);
}

#[test]
fn read_only_tools_pass_and_sensitive_paths_are_blocked() {
    let h = harness();
    let read = h.pre_tool("Read", json!({"file_path": h.source_file()}));
    assert!(!read.is_block());

    let secret = h.pre_tool("Read", json!({"file_path": "~/.ssh/id_rsa"}));
    assert!(secret.is_block());
    assert!(stderr(&secret).contains(".ssh"), "{}", stderr(&secret));

    let encoded = h.pre_tool("Read", json!({"file_path": "%7E/.aws/credentials"}));
    assert!(encoded.is_block());

    let state = h.state();
    assert_eq!(state.violations.len(), 2);
    assert!(state
        .violations
        .iter()
        .all(|violation| violation.rule == "sensitive_path"));
}

#[test]
fn shell_write_bypasses_are_blocked_but_safe_sinks_pass() {
    let h = harness();
    h.research_everything();

    let redirect = h.pre_tool(
        "Bash",
        json!({"command": "echo 'fn main() {}' > src/main.rs"}),
    );
    assert!(redirect.is_block());

    let sed = h.pre_tool("Bash", json!({"command": "sed -i 's/a/b/' src/lib.rs"}));
    assert!(sed.is_block());
    assert_eq!(h.state().violations.len(), 2);

    let tmp = h.pre_tool("Bash", json!({"command": "cargo test 2>&1 | tee /tmp/test.log"}));
    assert!(!tmp.is_block(), "{}", stderr(&tmp));

    let listing = h.pre_tool("Bash", json!({"command": "ls -la src"}));
    assert!(!listing.is_block());
}

#[test]
fn repeated_failures_trip_the_breaker_and_block_mutations() {
    let h = harness();
    h.research_everything();

    assert!(stdout(&h.fail_build()).is_empty());
    assert!(stdout(&h.fail_build()).is_empty());
    let tripped = h.fail_build();
    assert!(!tripped.is_block());
    assert!(stdout(&tripped).contains("circuit breaker tripped"));
    assert!(h.state().circuit_breaker.tripped);

    let edit = h.edit();
    assert!(edit.is_block());
    assert!(stderr(&edit).contains("circuit breaker"), "{}", stderr(&edit));
    assert!(!stderr(&edit).contains("saneprocess reset-breaker"));

    let read = h.pre_tool("Read", json!({"file_path": h.source_file()}));
    assert!(!read.is_block());

    h.hook(HookEvent::SessionStart, json!({"session_id": "next"}));
    let state = h.state();
    assert!(state.circuit_breaker.tripped);
    assert_eq!(state.research.satisfied_count(), 0);
    assert_eq!(state.session.session_id.as_deref(), Some("next"));
}

#[test]
fn errors_reported_with_exit_code_zero_still_trip_the_breaker() {
    let h = harness();
    for _ in 0..4 {
        h.post_tool(
            "Bash",
            json!({"command": "nope"}),
            json!({"stdout": "", "stderr": "bash: nope: command not found", "exit_code": 0}),
        );
    }
    let breaker = h.state().circuit_breaker;
    assert!(breaker.tripped);
    assert!(breaker.consecutive_failures >= 3);
}

#[test]
fn the_agent_cannot_clear_enforcement_state_through_the_shell() {
    let h = harness();
    for command in [
        "saneprocess reset-breaker",
        "saneprocess require verify",
        "echo '{}' | saneprocess hook session-start",
    ] {
        let response = h.pre_tool("Bash", json!({"command": command}));
        assert!(response.is_block(), "{command}");
        assert!(stderr(&response).contains("human operator"), "{}", stderr(&response));
    }

    h.research_everything();
    for _ in 0..3 {
        h.fail_build();
    }
    for command in [
        "saneprocess reset-breaker",
        "./target/debug/saneprocess reset-session",
        "rm -rf .saneprocess",
        "cat .saneprocess/state.json",
    ] {
        assert!(h.pre_tool("Bash", json!({"command": command})).is_block(), "{command}");
    }
    assert!(h.state().circuit_breaker.tripped);

    let status = h.pre_tool("Bash", json!({"command": "saneprocess status"}));
    assert!(!status.is_block(), "{}", stderr(&status));
}

#[test]
fn memory_writes_need_full_research() {
    let h = harness();
    for tool in [
        "mcp__memory__create_entities",
        "mcp__memory__add_observations",
        "mcp__memory__create_relations",
        "mcp__memory__delete_entities",
    ] {
        let response = h.pre_tool(tool, json!({"entities": [{"name": "logout"}]}));
        assert!(response.is_block(), "{tool}");
        assert!(stderr(&response).contains("0/5"), "{}", stderr(&response));
    }

    let read = h.pre_tool("mcp__memory__search_nodes", json!({"query": "logout"}));
    assert!(!read.is_block());

    h.research_everything();
    let write = h.pre_tool("mcp__memory__add_observations", json!({"observations": []}));
    assert!(!write.is_block(), "{}", stderr(&write));
}

#[test]
fn find_actions_and_stdin_scripts_cannot_edit_sources() {
    let h = harness();
    for command in [
        "find . -name '*.rs' -exec sed -i s/a/b/ {} +",
        "bash <<'EOF'\necho x > src/main.rs\nEOF",
        "echo 'echo x > src/main.rs' | sh",
        "python3 - <<EOF\nopen('src/main.rs', 'w').write('x')\nEOF",
    ] {
        let response = h.pre_tool("Bash", json!({"command": command}));
        assert!(response.is_block(), "{command}");
    }
    assert_eq!(h.state().violations.len(), 4);

    let search = h.pre_tool("Bash", json!({"command": "find src -name '*.rs' -exec grep -l main {} +"}));
    assert!(!search.is_block(), "{}", stderr(&search));
}

#[test]
fn globbed_paths_into_sensitive_locations_are_blocked() {
    let h = harness();
    for command in ["cat /et?/passwd", "cat ~/.ss*/config", "ls /{tmp,etc}/ssh"] {
        let response = h.pre_tool("Bash", json!({"command": command}));
        assert!(response.is_block(), "{command}");
    }
    let glob = h.pre_tool("Glob", json!({"pattern": "~/.a?s/*"}));
    assert!(glob.is_block());

    let sources = h.pre_tool("Bash", json!({"command": "ls src/*.rs"}));
    assert!(!sources.is_block(), "{}", stderr(&sources));
}

#[test]
fn build_directories_are_only_safe_at_the_project_root() {
    let h = harness();
    h.research_everything();
    let nested = h.pre_tool("Bash", json!({"command": "echo 'let x = 1' > src/build/gen.swift"}));
    assert!(nested.is_block());

    let output = h.pre_tool("Bash", json!({"command": "swift build 2>&1 | tee build/out.txt"}));
    assert!(!output.is_block(), "{}", stderr(&output));
}

#[test]
fn hand_edited_state_cannot_reset_the_breaker() {
    let h = harness();
    h.research_everything();
    for _ in 0..3 {
        h.fail_build();
    }
    assert!(h.state().circuit_breaker.tripped);

    let raw = fs::read_to_string(h.state_file()).expect("read state");
    let mut document: Value = serde_json::from_str(&raw).expect("parse state");
    document["circuitBreaker"]["tripped"] = json!(false);
    document["circuitBreaker"]["consecutiveFailures"] = json!(0);
    fs::write(h.state_file(), document.to_string()).expect("tamper");

    let edit = h.edit();
    assert!(edit.is_block());
    assert!(stderr(&edit).contains("integrity"), "{}", stderr(&edit));

    let state = h.state();
    assert!(state.circuit_breaker.tripped);
    assert_eq!(state.research.satisfied_count(), 0);
}

#[test]
fn lock_timeout_denies_mutations_but_not_reads() {
    let h = harness();
    let state_dir = h.project.join(".saneprocess");
    fs::create_dir_all(&state_dir).expect("state dir");
    fs::write(
        state_dir.join("config.yaml"),
        "lock:\n  timeout_ms: 100\n  poll_ms: 10\n",
    )
    .expect("write config");
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_secs();
    fs::write(
        state_dir.join("state.json.lock"),
        format!("{} {now}", std::process::id()),
    )
    .expect("hold lock");

    let edit = h.edit();
    assert!(edit.is_block());
    assert!(stderr(&edit).contains("state could not be updated"), "{}", stderr(&edit));

    let read = h.pre_tool("Read", json!({"file_path": h.source_file()}));
    assert!(!read.is_block());

    let stop = h.hook(HookEvent::Stop, json!({"summary": "nothing to report. Score: 7/10"}));
    assert!(!stop.is_block());
}

#[test]
fn malformed_stdin_blocks_pre_tool_only() {
    let h = harness();
    let pre = run_hook(HookEvent::PreTool, "{not json", h.env.clone());
    assert!(pre.is_block());

    let empty = run_hook(HookEvent::PreTool, "", h.env.clone());
    assert!(empty.is_block());

    let post = run_hook(HookEvent::PostTool, "{not json", h.env.clone());
    assert!(!post.is_block());

    let prompt = run_hook(HookEvent::Prompt, "[1, 2]", h.env.clone());
    assert!(!prompt.is_block());

    let no_tool = h.hook(HookEvent::PreTool, json!({"tool_input": {}}));
    assert!(no_tool.is_block());
}

#[test]
fn big_task_prompt_requires_a_plan_before_edits() {
    let h = harness();
    let prompt = h.hook(
        HookEvent::Prompt,
        json!({"prompt": "fix everything in the module"}),
    );
    assert!(stdout(&prompt).contains("big_task"), "{}", stdout(&prompt));
    let state = h.state();
    assert!(state.is_big_task);
    assert!(state.requirements.requested.contains(&RequirementKind::Plan));

    h.research_everything();
    let edit = h.edit();
    assert!(edit.is_block());
    assert!(stderr(&edit).contains("plan"), "{}", stderr(&edit));

    let plan = h.project.join("docs/plan.md").display().to_string();
    let write_plan = h.pre_tool("Write", json!({"file_path": plan, "content": "# Plan"}));
    assert!(!write_plan.is_block(), "{}", stderr(&write_plan));

    assert!(!h.edit().is_block());
}

#[test]
fn a_blocked_plan_write_does_not_satisfy_the_plan() {
    let h = harness();
    h.hook(HookEvent::Prompt, json!({"prompt": "update all the handlers"}));
    let plan = h.project.join("PLAN.md").display().to_string();
    let write_plan = h.pre_tool("Write", json!({"file_path": plan, "content": "# Plan"}));
    assert!(write_plan.is_block());

    let state = h.state();
    assert!(state.requirements.requested.contains(&RequirementKind::Plan));
    assert!(!state.requirements.is_satisfied(RequirementKind::Plan));
}

#[test]
fn contracted_questions_and_status_reports_are_classified() {
    let h = harness();
    let question = h.hook(HookEvent::Prompt, json!({"prompt": "what's the status of the build"}));
    assert!(stdout(&question).contains("question"), "{}", stdout(&question));
    assert_eq!(h.state().prompt.last_kind, Some(PromptKind::Question));

    h.hook(HookEvent::Prompt, json!({"prompt": "the fix is working now"}));
    assert_eq!(h.state().prompt.last_kind, Some(PromptKind::Passthrough));
}

#[test]
fn ordinary_chatter_adds_no_context() {
    let h = harness();
    let ack = h.hook(HookEvent::Prompt, json!({"prompt": "ok"}));
    assert!(ack.stdout.is_none());
    assert!(!ack.is_block());
}

#[test]
fn stop_requires_a_summary_after_edits_and_resets_the_session() {
    let h = harness();
    h.research_everything();
    assert!(!h.edit().is_block());
    h.record_edit(&h.source_file());

    let missing = h.hook(HookEvent::Stop, json!({}));
    assert!(missing.is_block());
    assert!(stderr(&missing).contains("no summary"), "{}", stderr(&missing));

    let bogus = h.hook(
        HookEvent::Stop,
        json!({"summary": "Changed file.rb:50 as requested. Score: 8/10"}),
    );
    assert!(bogus.is_block());
    assert!(stderr(&bogus).contains("file.rb:50"));

    let honest = h.hook(
        HookEvent::Stop,
        json!({"summary": "Added logout handling in src/main.rs:12. Rule #1 followed: checked memory, docs, web, github and local code first. Score: 8/10"}),
    );
    assert!(!honest.is_block(), "{}", stderr(&honest));

    let state = h.state();
    assert_eq!(state.edits.count, 0);
    assert_eq!(state.audit.scores, vec![8]);
    assert_eq!(state.audit.streak, 1);
}

#[test]
fn stop_reads_the_configured_summary_file() {
    let h = harness();
    let state_dir = h.project.join(".saneprocess");
    fs::create_dir_all(&state_dir).expect("state dir");
    fs::write(
        state_dir.join("config.yaml"),
        "audit:\n  summary_file: SESSION_SUMMARY.md\n",
    )
    .expect("write config");
    fs::write(
        h.project.join("SESSION_SUMMARY.md"),
        "Session summary. Score: 10/10",
    )
    .expect("write summary");

    h.pre_tool("Read", json!({"file_path": "~/.ssh/id_rsa"}));
    let stop = h.hook(HookEvent::Stop, json!({}));
    assert!(stop.is_block());
    assert!(stderr(&stop).contains("violation"), "{}", stderr(&stop));

    let relaxed = h.hook(HookEvent::Stop, json!({"stop_hook_active": true}));
    assert!(!relaxed.is_block());
    assert!(stdout(&relaxed).contains("not blocking"));
}

#[test]
fn a_reported_score_is_audited_without_a_summary() {
    let h = harness();
    h.pre_tool("Read", json!({"file_path": "~/.ssh/id_rsa"}));
    let stop = h.hook(HookEvent::Stop, json!({"compliance_score": 10}));
    assert!(stop.is_block());
    assert!(stderr(&stop).contains("10/10"), "{}", stderr(&stop));
}

#[test]
fn unusable_settings_still_block_mutations() {
    let h = harness();
    let state_dir = h.project.join(".saneprocess");
    fs::create_dir_all(&state_dir).expect("state dir");
    fs::write(state_dir.join("config.yaml"), "breaker: [").expect("write config");

    let edit = h.edit();
    assert!(edit.is_block());
    assert!(stderr(&edit).contains("state unavailable"));

    let read = h.pre_tool("Read", json!({"file_path": h.source_file()}));
    assert!(!read.is_block());

    let secret = h.pre_tool("Read", json!({"file_path": "~/.ssh/config"}));
    assert!(secret.is_block());
}
