use super::canonical::{canonicalize, CanonicalPath};
use super::shell_words::{self, basename, RedirectKind, SimpleCommand};
use super::SecurityDecision;
use crate::config::PathSettings;
use std::path::{Path, PathBuf};

const MAX_NESTING: usize = 4;

const NULL_SINKS: &[&str] = &["/dev/null", "/dev/stdout", "/dev/stderr", "/dev/tty"];

const SAFE_PREFIXES: &[&str] = &[
    "/tmp",
    "/private/tmp",
    "/var/folders",
    "/private/var/folders",
];

const HOME_SAFE_PREFIXES: &[&str] = &["~/Library/Developer/Xcode/DerivedData"];

// Build output directories, safe only at the top of the project.
const SAFE_SEGMENTS: &[&str] = &["DerivedData", ".build", "build"];

// Verbs of this binary that change enforcement state.
const OPERATOR_VERBS: &[&str] = &["hook", "reset-breaker", "reset-session", "require"];

const FIND_EXEC: &[&str] = &["-exec", "-execdir", "-ok", "-okdir"];

const FIND_OUTPUT: &[&str] = &["-fprint", "-fprint0", "-fprintf", "-fls"];

const MUTATING_PROGRAMS: &[&str] = &[
    "rm", "rmdir", "mv", "cp", "mkdir", "touch", "chmod", "chown", "ln", "install", "rsync",
    "ditto", "unzip", "tar", "patch", "truncate", "dd", "tee",
];

const MUTATING_GIT: &[&str] = &[
    "commit",
    "push",
    "reset",
    "checkout",
    "switch",
    "merge",
    "rebase",
    "cherry-pick",
    "revert",
    "stash",
    "clean",
    "rm",
    "mv",
    "add",
    "restore",
    "am",
    "apply",
    "pull",
    "tag",
];

const PACKAGE_MANAGERS: &[(&str, &[&str])] = &[
    ("npm", &["install", "i", "ci", "uninstall", "update", "add"]),
    ("yarn", &["add", "install", "remove", "upgrade"]),
    ("pnpm", &["add", "install", "remove", "update"]),
    ("pip", &["install", "uninstall"]),
    ("pip3", &["install", "uninstall"]),
    ("brew", &["install", "uninstall", "upgrade"]),
    ("gem", &["install", "uninstall"]),
    ("bundle", &["install", "update", "add"]),
    ("cargo", &["install", "add", "remove", "update"]),
    ("pod", &["install", "update"]),
];

const INTERPRETERS: &[&str] = &[
    "python", "python3", "ruby", "perl", "node", "osascript", "php",
];

const SCRIPT_WRITE_MARKERS: &[&str] = &[
    "write_text",
    "write_bytes",
    ".write(",
    "writefile",
    "writefilesync",
    "appendfile",
    "file.write",
    "io.write",
    "print {",
    "shutil.",
    "os.remove",
    "os.rename",
    "unlink",
    "fileutils",
];

const SHELLS: &[&str] = &["sh", "bash", "zsh", "dash", "ksh"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassReport {
    pub decision: SecurityDecision,
    pub mutating: bool,
    pub remote: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassDetector {
    home: Option<PathBuf>,
    project_root: Option<String>,
    extra_safe_sinks: Vec<String>,
}

#[derive(Debug, Default)]
struct Findings {
    blocked: Option<String>,
    mutating: bool,
    remote: bool,
}

impl Findings {
    fn block(&mut self, reason: String) {
        self.mutating = true;
        if self.blocked.is_none() {
            self.blocked = Some(reason);
        }
    }
}

enum StdinScript {
    Text(String),
    Opaque(String),
}

impl BypassDetector {
    pub fn new(home: Option<PathBuf>, extra_safe_sinks: &[String]) -> Self {
        let home_sinks = HOME_SAFE_PREFIXES
            .iter()
            .copied()
            .filter(|_| home.is_some());
        let extra_safe_sinks = extra_safe_sinks
            .iter()
            .map(String::as_str)
            .chain(home_sinks)
            .filter_map(|sink| canonicalize(sink, home.as_deref()).ok())
            .map(|canonical| canonical.text)
            .collect();
        Self {
            home,
            project_root: None,
            extra_safe_sinks,
        }
    }

    pub fn from_settings(home: Option<PathBuf>, settings: &PathSettings) -> Self {
        Self::new(home, &settings.extra_safe_sinks)
    }

    /// Anchors the build-output sinks to `root`; without a root only
    /// relative targets can land in them.
    pub fn with_project_root(mut self, root: Option<&Path>) -> Self {
        self.project_root = root
            .and_then(Path::to_str)
            .and_then(|root| canonicalize(root, self.home.as_deref()).ok())
            .filter(|canonical| canonical.absolute)
            .map(|canonical| canonical.text);
        self
    }

    pub fn inspect(&self, command: &str) -> BypassReport {
        let mut findings = Findings::default();
        self.scan(command, 0, &mut findings);
        let decision = match findings.blocked {
            Some(reason) => SecurityDecision::block(reason),
            None => SecurityDecision::allow("no file mutation outside the edit tools"),
        };
        BypassReport {
            decision,
            mutating: findings.mutating,
            remote: findings.remote,
        }
    }

    pub fn is_safe_sink(&self, target: &str) -> bool {
        let Ok(canonical) = canonicalize(target, self.home.as_deref()) else {
            return false;
        };
        let text = canonical.text.as_str();
        if is_null_sink(text) {
            return true;
        }
        let under_safe_prefix = SAFE_PREFIXES.iter().any(|prefix| is_under(text, prefix))
            || self
                .extra_safe_sinks
                .iter()
                .any(|prefix| is_under(text, prefix));
        if under_safe_prefix || self.in_build_output(&canonical) {
            return true;
        }
        text.ends_with(".log")
    }

    fn in_build_output(&self, canonical: &CanonicalPath) -> bool {
        let segments: Vec<&str> = canonical.segments().collect();
        let project_relative = if canonical.absolute {
            let Some(root) = self.project_root.as_deref() else {
                return false;
            };
            let root: Vec<&str> = root.split('/').filter(|s| !s.is_empty()).collect();
            if !segments.starts_with(&root) {
                return false;
            }
            &segments[root.len()..]
        } else {
            &segments[..]
        };
        project_relative.len() > 1 && SAFE_SEGMENTS.contains(&project_relative[0])
    }

    fn scan(&self, command: &str, depth: usize, findings: &mut Findings) {
        if depth > MAX_NESTING {
            findings.block("shell nesting is too deep to inspect".to_string());
            return;
        }
        let parsed = shell_words::parse(command);
        for (index, simple) in parsed.commands.iter().enumerate() {
            let upstream = index
                .checked_sub(1)
                .filter(|_| simple.piped)
                .and_then(|previous| parsed.commands.get(previous));
            self.scan_redirects(simple, findings);
            self.scan_program(simple, upstream, depth, findings);
        }
        for body in &parsed.substitutions {
            self.scan(body, depth + 1, findings);
        }
    }

    fn scan_redirects(&self, simple: &SimpleCommand, findings: &mut Findings) {
        for redirect in simple.redirects.iter().filter(|r| r.kind.writes_file()) {
            let operator = redirect.kind.operator();
            let Some(target) = redirect.target.as_deref() else {
                findings.block(format!("output redirection `{operator}` without a target"));
                continue;
            };
            if is_null_sink(target) {
                continue;
            }
            findings.mutating = true;
            if !self.is_safe_sink(target) {
                findings.block(format!(
                    "output redirection `{operator}` writes to `{target}`; use the Edit or Write tool"
                ));
            }
        }
    }

    fn check_targets<'a>(
        &self,
        form: &str,
        targets: impl IntoIterator<Item = &'a str>,
        findings: &mut Findings,
    ) {
        findings.mutating = true;
        for target in targets {
            if !self.is_safe_sink(target) {
                findings.block(format!(
                    "`{form}` writes to `{target}`; use the Edit or Write tool"
                ));
                return;
            }
        }
    }

    fn scan_program(
        &self,
        simple: &SimpleCommand,
        upstream: Option<&SimpleCommand>,
        depth: usize,
        findings: &mut Findings,
    ) {
        let Some(program) = simple.program() else {
            return;
        };
        let args = simple.args();
        match program {
            "saneprocess" => {
                if let Some(verb) = first_operand(args).filter(|verb| OPERATOR_VERBS.contains(verb)) {
                    findings.block(format!(
                        "`saneprocess {verb}` changes enforcement state and is reserved for a human operator"
                    ));
                }
            }
            "find" => self.scan_find(args, depth, findings),
            "tee" => self.check_targets("tee", operands(args), findings),
            "sed" | "gsed" => {
                if args.iter().any(|arg| is_sed_in_place(arg)) {
                    self.check_targets("sed -i", sed_files(args), findings);
                }
            }
            "perl" | "ruby" if args.iter().any(|arg| is_short_flag_with(arg, 'i')) => {
                let form = format!("{program} -i");
                self.check_targets(&form, script_files(args), findings);
            }
            "dd" => {
                let targets = args.iter().filter_map(|arg| arg.strip_prefix("of="));
                self.check_targets("dd of=", targets, findings);
            }
            "cp" | "mv" | "install" | "rsync" | "ditto" => {
                findings.mutating = true;
                let files: Vec<&str> = operands(args).collect();
                if let [_, .., destination] = files.as_slice() {
                    if looks_like_source_file(destination) && !self.is_safe_sink(destination) {
                        findings.block(format!(
                            "`{program}` overwrites source file `{destination}`; use the Edit or Write tool"
                        ));
                    }
                }
            }
            "curl" => {
                let targets = option_values(args, &["-o", "--output"]);
                if !targets.is_empty() {
                    self.check_targets("curl -o", targets, findings);
                }
                if args.iter().any(|arg| arg == "-O" || arg == "--remote-name") {
                    findings.mutating = true;
                }
            }
            "wget" => {
                let targets: Vec<&str> = option_values(args, &["-O", "--output-document"])
                    .into_iter()
                    .filter(|target| *target != "-")
                    .collect();
                findings.mutating = true;
                self.check_targets("wget -O", targets, findings);
            }
            "git" => self.scan_git(args, findings),
            "gh" => scan_gh(args, findings),
            "truncate" => {
                let targets = operands_skipping(args, &["-s", "--size", "-r", "--reference"]);
                self.check_targets("truncate", targets, findings);
            }
            "patch" => {
                findings.mutating = true;
                if !args.iter().any(|arg| arg == "--dry-run" || arg == "-C") {
                    findings.block(
                        "`patch` applies changes outside the edit tools; use Edit".to_string(),
                    );
                }
            }
            "eval" => self.scan(&args.join(" "), depth + 1, findings),
            shell if SHELLS.contains(&shell) => {
                if let Some(script) = value_after(args, "-c") {
                    self.scan(script, depth + 1, findings);
                    return;
                }
                match stdin_script(simple, upstream) {
                    Some(StdinScript::Text(script)) => self.scan(&script, depth + 1, findings),
                    Some(StdinScript::Opaque(source)) => findings.block(format!(
                        "`{shell}` runs a script read from {source} that cannot be inspected; run the commands directly"
                    )),
                    None => {}
                }
            }
            interpreter if INTERPRETERS.contains(&interpreter) => {
                let script = value_after(args, "-c").or_else(|| value_after(args, "-e"));
                let script = match script {
                    Some(script) => StdinScript::Text(script.to_string()),
                    None => match stdin_script(simple, upstream) {
                        Some(script) => script,
                        None => return,
                    },
                };
                match script {
                    StdinScript::Text(script) if script_writes_files(&script) => {
                        findings.block(format!(
                            "`{interpreter}` script writes files; use the Edit or Write tool"
                        ));
                    }
                    StdinScript::Text(_) => {}
                    StdinScript::Opaque(source) => findings.block(format!(
                        "`{interpreter}` runs a script read from {source} that cannot be inspected"
                    )),
                }
            }
            other => {
                if MUTATING_PROGRAMS.contains(&other) {
                    findings.mutating = true;
                }
                if let Some((_, verbs)) = PACKAGE_MANAGERS.iter().find(|(name, _)| *name == other)
                {
                    if first_operand(args).is_some_and(|verb| verbs.contains(&verb)) {
                        findings.mutating = true;
                    }
                }
            }
        }
    }

    fn scan_find(&self, args: &[String], depth: usize, findings: &mut Findings) {
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let arg = arg.as_str();
            if arg == "-delete" {
                findings.mutating = true;
            } else if FIND_EXEC.contains(&arg) {
                let words: Vec<String> = iter
                    .by_ref()
                    .take_while(|word| !matches!(word.as_str(), ";" | "+"))
                    .cloned()
                    .collect();
                if depth + 1 > MAX_NESTING {
                    findings.block("shell nesting is too deep to inspect".to_string());
                    return;
                }
                let nested = SimpleCommand {
                    words,
                    ..SimpleCommand::default()
                };
                self.scan_program(&nested, None, depth + 1, findings);
            } else if FIND_OUTPUT.contains(&arg) {
                if let Some(target) = iter.next() {
                    self.check_targets(&format!("find {arg}"), [target.as_str()], findings);
                }
            }
        }
    }

    fn scan_git(&self, args: &[String], findings: &mut Findings) {
        let Some(subcommand) = git_subcommand(args) else {
            return;
        };
        if MUTATING_GIT.contains(&subcommand) {
            findings.mutating = true;
        }
        match subcommand {
            "push" => findings.remote = true,
            "apply" => {
                let inspect_only = args.iter().any(|arg| {
                    matches!(arg.as_str(), "--check" | "--stat" | "--numstat" | "--summary")
                });
                if inspect_only {
                    findings.mutating = false;
                } else {
                    findings.block(
                        "`git apply` patches files outside the edit tools; use Edit".to_string(),
                    );
                }
            }
            _ => {}
        }
    }
}

fn scan_gh(args: &[String], findings: &mut Findings) {
    let words: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|arg| !arg.starts_with('-'))
        .take(2)
        .collect();
    let remote = matches!(
        words.as_slice(),
        ["pr", "create" | "merge" | "close" | "edit" | "comment"]
            | ["issue", "create" | "close" | "edit" | "comment"]
            | ["repo", "fork" | "create" | "delete" | "edit"]
            | ["release", "create" | "delete"]
    );
    if remote {
        findings.remote = true;
        findings.mutating = true;
    }
}

// The script a shell or interpreter reads on stdin, when it has no script
// operand of its own.
fn stdin_script(simple: &SimpleCommand, upstream: Option<&SimpleCommand>) -> Option<StdinScript> {
    if first_operand(simple.args()).is_some() {
        return None;
    }
    for redirect in &simple.redirects {
        let target = redirect.target.clone().unwrap_or_default();
        match redirect.kind {
            RedirectKind::Heredoc => {
                return Some(StdinScript::Text(redirect.body.clone().unwrap_or_default()))
            }
            RedirectKind::HereString => return Some(StdinScript::Text(target)),
            RedirectKind::In => return Some(StdinScript::Opaque(format!("`{target}`"))),
            _ => {}
        }
    }
    let upstream = upstream?;
    match upstream.program() {
        Some("echo" | "printf") => {
            let text: Vec<&str> = operands(upstream.args()).collect();
            Some(StdinScript::Text(text.join(" ").replace("\\n", "\n")))
        }
        Some("cat") if operands(upstream.args()).next().is_none() => upstream
            .redirects
            .iter()
            .find_map(|redirect| match redirect.kind {
                RedirectKind::Heredoc => redirect.body.clone(),
                RedirectKind::HereString => redirect.target.clone(),
                _ => None,
            })
            .map(StdinScript::Text)
            .or_else(|| Some(StdinScript::Opaque("`cat`".to_string()))),
        Some(program) => Some(StdinScript::Opaque(format!("`{program}`"))),
        None => Some(StdinScript::Opaque("a pipe".to_string())),
    }
}

fn is_null_sink(target: &str) -> bool {
    NULL_SINKS.contains(&target) || target.starts_with("/dev/fd/")
}

fn is_under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/') || prefix.ends_with('/'))
}

fn is_sed_in_place(arg: &str) -> bool {
    arg == "--in-place" || arg.starts_with("--in-place=") || is_short_flag_with(arg, 'i')
}

fn is_short_flag_with(arg: &str, flag: char) -> bool {
    let Some(cluster) = arg.strip_prefix('-') else {
        return false;
    };
    if cluster.starts_with('-') {
        return false;
    }
    let letters: String = cluster
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    letters.contains(flag)
}

fn operands(args: &[String]) -> impl Iterator<Item = &str> {
    args.iter()
        .map(String::as_str)
        .filter(|arg| !arg.is_empty() && !arg.starts_with('-'))
}

fn first_operand(args: &[String]) -> Option<&str> {
    operands(args).next()
}

fn operands_skipping<'a>(args: &'a [String], valued: &[&str]) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if valued.contains(&arg.as_str()) {
            skip_next = true;
            continue;
        }
        if !arg.is_empty() && !arg.starts_with('-') {
            result.push(arg.as_str());
        }
    }
    result
}

fn sed_files(args: &[String]) -> Vec<&str> {
    let explicit_script = args
        .iter()
        .any(|arg| matches!(arg.as_str(), "-e" | "-f" | "--expression" | "--file"));
    let mut files = operands_skipping(args, &["-e", "-f", "--expression", "--file"]);
    if !explicit_script && !files.is_empty() {
        files.remove(0);
    }
    files
}

fn script_files(args: &[String]) -> Vec<&str> {
    operands_skipping(args, &["-e", "-E", "-M", "-I"])
}

fn option_values<'a>(args: &'a [String], names: &[&str]) -> Vec<&'a str> {
    let mut values = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let arg = arg.as_str();
        if names.contains(&arg) {
            if let Some(value) = iter.next() {
                values.push(value.as_str());
            }
            continue;
        }
        for name in names {
            if let Some(value) = arg.strip_prefix(name) {
                if name.starts_with("--") {
                    if let Some(value) = value.strip_prefix('=') {
                        values.push(value);
                    }
                } else if !value.is_empty() {
                    values.push(value);
                }
            }
        }
    }
    values
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let position = args.iter().position(|arg| {
        arg == flag || (arg.starts_with('-') && !arg.starts_with("--") && arg.ends_with(&flag[1..]))
    })?;
    args.get(position + 1).map(String::as_str)
}

fn git_subcommand(args: &[String]) -> Option<&str> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-C" | "-c" | "--git-dir" | "--work-tree" => {
                iter.next();
            }
            flag if flag.starts_with('-') => {}
            subcommand => return Some(subcommand),
        }
    }
    None
}

fn script_writes_files(script: &str) -> bool {
    let lowered = script
        .to_ascii_lowercase()
        .replace("stdout.write(", "")
        .replace("stderr.write(", "");
    if SCRIPT_WRITE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        return true;
    }
    lowered.contains("open")
        && ["'w", "\"w", "'a'", "\"a\""]
            .iter()
            .any(|mode| lowered.contains(mode))
}

fn looks_like_source_file(target: &str) -> bool {
    let name = basename(target.trim_end_matches('/'));
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    Path::new(name).extension().is_some()
        || name.starts_with('.')
        || matches!(name, "Makefile" | "Dockerfile" | "Gemfile" | "Podfile" | "Rakefile")
}
