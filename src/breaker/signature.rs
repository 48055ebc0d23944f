use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorSignature {
    CommandNotFound,
    AccessDenied,
    PermissionDenied,
    FileNotFound,
    TypeError,
    SyntaxError,
    ConnectionError,
    Timeout,
    GitError,
    BuildFailed,
    TestFailed,
    MemoryError,
    EditMismatch,
    IntegrityViolation,
    UnknownError,
}

impl ErrorSignature {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CommandNotFound => "COMMAND_NOT_FOUND",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::FileNotFound => "FILE_NOT_FOUND",
            Self::TypeError => "TYPE_ERROR",
            Self::SyntaxError => "SYNTAX_ERROR",
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::GitError => "GIT_ERROR",
            Self::BuildFailed => "BUILD_FAILED",
            Self::TestFailed => "TEST_FAILED",
            Self::MemoryError => "MEMORY_ERROR",
            Self::EditMismatch => "EDIT_MISMATCH",
            Self::IntegrityViolation => "INTEGRITY_VIOLATION",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Order matters: the first matching pattern wins.
const SIGNATURE_PATTERNS: &[(&str, ErrorSignature)] = &[
    (
        r"(?i)command not found|not recognized as an internal or external command|no such command|unknown command",
        ErrorSignature::CommandNotFound,
    ),
    (
        r"(?i)access denied|unauthorized|forbidden|authentication failed|bad credentials",
        ErrorSignature::AccessDenied,
    ),
    (
        r"(?i)permission denied|operation not permitted|\beacces\b|\beperm\b|read-only file system",
        ErrorSignature::PermissionDenied,
    ),
    (
        r"(?i)string to replace not found|old_string|no match for the edit|file has been modified since|has not been read yet",
        ErrorSignature::EditMismatch,
    ),
    (
        r"(?i)fatal: |not a git repository|merge conflict|\bconflict \(|rejected.*non-fast-forward|detached head|pathspec .* did not match",
        ErrorSignature::GitError,
    ),
    (
        r"(?i)no such file or directory|file not found|\benoent\b|does not exist|cannot find (the )?(file|path)|couldn't find file",
        ErrorSignature::FileNotFound,
    ),
    (
        r"(?i)type ?error|cannot convert value of type|mismatched types|expected type|is not assignable to type|undefined method|nomethoderror",
        ErrorSignature::TypeError,
    ),
    (
        r"(?i)syntax ?error|unexpected token|parse error|unexpected end of (file|input)|expected expression|unterminated",
        ErrorSignature::SyntaxError,
    ),
    (
        r"(?i)\btimed? ?out\b|deadline exceeded",
        ErrorSignature::Timeout,
    ),
    (
        r"(?i)connection (refused|reset|closed)|could not resolve host|network is unreachable|econnrefused|econnreset|ssl error|name or service not known",
        ErrorSignature::ConnectionError,
    ),
    (
        r"(?i)tests? failed|test result: failed|failing tests?|\b\d+ (failed|failures?)\b|assertion failed|test suite .* failed",
        ErrorSignature::TestFailed,
    ),
    (
        r"(?i)build failed|\*\* build failed \*\*|compilation failed|could not compile|linker command failed|error: aborting due to",
        ErrorSignature::BuildFailed,
    ),
    (
        r"(?i)out of memory|cannot allocate memory|memory allocation failed|killed: 9",
        ErrorSignature::MemoryError,
    ),
];

fn compiled_patterns() -> &'static [(Regex, ErrorSignature)] {
    static PATTERNS: OnceLock<Vec<(Regex, ErrorSignature)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        SIGNATURE_PATTERNS
            .iter()
            .filter_map(|(pattern, signature)| {
                Regex::new(pattern).ok().map(|regex| (regex, *signature))
            })
            .collect()
    })
}

pub fn normalize_error(text: &str) -> ErrorSignature {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ErrorSignature::UnknownError;
    }
    compiled_patterns()
        .iter()
        .find(|(regex, _)| regex.is_match(trimmed))
        .map(|(_, signature)| *signature)
        .unwrap_or(ErrorSignature::UnknownError)
}
