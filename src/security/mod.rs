pub mod bypass;
pub mod canonical;
pub mod glob;
pub mod path_filter;
pub mod shell_words;

pub use bypass::{BypassDetector, BypassReport};
pub use canonical::{canonicalize, CanonicalPath};
pub use path_filter::{PathCheck, PathFilter};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Block,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Block => "block",
        }
    }

    pub fn is_block(self) -> bool {
        self == Self::Block
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityDecision {
    pub verdict: Verdict,
    pub reason: String,
}

impl SecurityDecision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Allow,
            reason: reason.into(),
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Block,
            reason: reason.into(),
        }
    }

    pub fn is_block(&self) -> bool {
        self.verdict.is_block()
    }
}
