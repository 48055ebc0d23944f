use super::canonical::{canonicalize, CanonicalPath};
use super::glob;
use super::shell_words;
use super::SecurityDecision;
use crate::config::{PathSettings, STATE_DIR_NAME};
use std::path::{Path, PathBuf};

const HOME_BLOCKLIST: &[&str] = &[
    ".ssh",
    ".aws",
    ".claude_hook_secret",
    ".netrc",
    ".gnupg",
    ".git-credentials",
    ".docker/config.json",
    ".kube/config",
];

const ROOT_BLOCKLIST: &[&str] = &["/etc", "/private/etc"];

const SENSITIVE_DOTFILES: &[&str] = &[
    ".ssh",
    ".aws",
    ".netrc",
    ".gnupg",
    ".claude_hook_secret",
    ".git-credentials",
    STATE_DIR_NAME,
];

const CREDENTIAL_BASENAMES: &[&str] = &[
    "id_rsa",
    "id_ed25519",
    "id_ecdsa",
    "id_dsa",
    ".pgpass",
    ".git-credentials",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCheck {
    pub decision: SecurityDecision,
    pub canonical: String,
    pub traversal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFilter {
    home: Option<PathBuf>,
    blocklist: Vec<Vec<String>>,
}

impl PathFilter {
    pub fn new(home: Option<PathBuf>, extra_blocked: &[String]) -> Self {
        let mut blocklist = Vec::new();
        for entry in ROOT_BLOCKLIST {
            blocklist.push(segments_of(entry));
        }
        if let Some(home) = home.as_deref().and_then(Path::to_str) {
            let home = home.trim_end_matches('/');
            for entry in HOME_BLOCKLIST {
                blocklist.push(segments_of(&format!("{home}/{entry}")));
            }
        }
        for extra in extra_blocked {
            if let Ok(canonical) = canonicalize(extra, home.as_deref()) {
                if canonical.absolute && canonical.segments().next().is_some() {
                    blocklist.push(canonical.segments().map(str::to_string).collect());
                }
            }
        }
        Self { home, blocklist }
    }

    pub fn from_settings(home: Option<PathBuf>, settings: &PathSettings) -> Self {
        Self::new(home, &settings.extra_blocked)
    }

    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    pub fn canonicalize(&self, raw: &str) -> Option<CanonicalPath> {
        canonicalize(raw, self.home.as_deref()).ok()
    }

    pub fn check_path(&self, raw: &str) -> PathCheck {
        let Ok(canonical) = canonicalize(raw, self.home.as_deref()) else {
            return PathCheck {
                decision: SecurityDecision::block("path contains an embedded NUL byte"),
                canonical: String::new(),
                traversal: false,
            };
        };
        let decision = match self.match_blocked(&canonical) {
            Some(reason) => SecurityDecision::block(reason),
            None => SecurityDecision::allow("path is outside the sensitive set"),
        };
        PathCheck {
            decision,
            canonical: canonical.text,
            traversal: canonical.traversal,
        }
    }

    pub fn check_command(&self, command: &str) -> SecurityDecision {
        let parsed = shell_words::parse(command);
        for word in parsed.all_words() {
            for candidate in path_candidates(word) {
                let check = self.check_path(candidate);
                if check.decision.is_block() {
                    return SecurityDecision::block(format!(
                        "command references `{candidate}`: {}",
                        check.decision.reason
                    ));
                }
            }
        }
        for body in &parsed.substitutions {
            let nested = self.check_command(body);
            if nested.is_block() {
                return nested;
            }
        }
        SecurityDecision::allow("command references no sensitive path")
    }

    fn match_blocked(&self, canonical: &CanonicalPath) -> Option<String> {
        let segments: Vec<&str> = canonical.segments().collect();

        if canonical.absolute {
            for entry in &self.blocklist {
                let anchored = entry.len() <= segments.len()
                    && entry
                        .iter()
                        .zip(&segments)
                        .all(|(want, have)| segment_matches(have, want));
                if anchored {
                    return Some(format!(
                        "`{}` is inside blocked location `/{}`",
                        canonical.text,
                        entry.join("/")
                    ));
                }
            }
        }

        for segment in &segments {
            if let Some(name) = SENSITIVE_DOTFILES
                .iter()
                .find(|name| may_be_dotfile_variant(segment, name))
            {
                return Some(format!(
                    "`{}` contains sensitive segment `{segment}` (matches `{name}`)",
                    canonical.text
                ));
            }
        }

        if let Some(basename) = segments.last() {
            let credential = CREDENTIAL_BASENAMES.iter().any(|name| {
                if glob::is_pattern(basename) {
                    !glob::is_bare_wildcard(basename) && glob::matches(basename, name)
                } else {
                    basename == name
                }
            });
            if credential {
                return Some(format!(
                    "`{}` names credential file `{basename}`",
                    canonical.text
                ));
            }
        }
        None
    }
}

fn segments_of(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

// A glob segment is blocked when some expansion of it would be.
fn segment_matches(have: &str, want: &str) -> bool {
    if glob::is_pattern(have) {
        glob::matches(have, want)
    } else {
        have == want
    }
}

// `.ssh`, `.ssh_backup`, `.aws-old` match; `.awsome` does not.
fn may_be_dotfile_variant(segment: &str, name: &str) -> bool {
    if glob::is_pattern(segment) {
        return glob::matches_prefix(segment, name, continues_dotfile_name);
    }
    let Some(rest) = segment.strip_prefix(name) else {
        return false;
    };
    rest.chars().next().map_or(true, continues_dotfile_name)
}

fn continues_dotfile_name(next: char) -> bool {
    matches!(next, '_' | '-' | '.' | '~') || next.is_ascii_digit()
}

fn path_candidates(word: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    if word.contains("://") {
        return candidates;
    }
    if looks_like_path(word) {
        candidates.push(word);
    }
    if let Some((_, value)) = word.split_once('=') {
        if looks_like_path(value) {
            candidates.push(value);
        }
    }
    candidates
}

fn looks_like_path(word: &str) -> bool {
    if word.is_empty() || word.contains("://") {
        return false;
    }
    let lowered = word.to_ascii_lowercase();
    word.contains('/')
        || word.contains('\\')
        || word.starts_with('~')
        || word.starts_with('.')
        || word.starts_with("$HOME")
        || word.starts_with("${HOME}")
        || lowered.contains("%2f")
        || lowered.contains("%2e")
        || CREDENTIAL_BASENAMES.contains(&word)
}
