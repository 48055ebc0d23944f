use crate::breaker::CircuitBreakerState;
use crate::prompt::PromptKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const STATE_SCHEMA_VERSION: u32 = 1;
const MAX_VIOLATIONS: usize = 100;
const MAX_SCORE_HISTORY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchCategory {
    Memory,
    Docs,
    Web,
    Github,
    Local,
}

impl ResearchCategory {
    pub const ALL: [ResearchCategory; 5] = [
        Self::Memory,
        Self::Docs,
        Self::Web,
        Self::Github,
        Self::Local,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Docs => "docs",
            Self::Web => "web",
            Self::Github => "github",
            Self::Local => "local",
        }
    }
}

impl std::fmt::Display for ResearchCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchFlags {
    #[serde(default)]
    pub memory: bool,
    #[serde(default)]
    pub docs: bool,
    #[serde(default)]
    pub web: bool,
    #[serde(default)]
    pub github: bool,
    #[serde(default)]
    pub local: bool,
}

impl ResearchFlags {
    pub fn is_satisfied(&self, category: ResearchCategory) -> bool {
        match category {
            ResearchCategory::Memory => self.memory,
            ResearchCategory::Docs => self.docs,
            ResearchCategory::Web => self.web,
            ResearchCategory::Github => self.github,
            ResearchCategory::Local => self.local,
        }
    }

    pub fn mark(&mut self, category: ResearchCategory) -> bool {
        let slot = match category {
            ResearchCategory::Memory => &mut self.memory,
            ResearchCategory::Docs => &mut self.docs,
            ResearchCategory::Web => &mut self.web,
            ResearchCategory::Github => &mut self.github,
            ResearchCategory::Local => &mut self.local,
        };
        let newly = !*slot;
        *slot = true;
        newly
    }

    pub fn missing(&self) -> Vec<ResearchCategory> {
        ResearchCategory::ALL
            .into_iter()
            .filter(|category| !self.is_satisfied(*category))
            .collect()
    }

    pub fn satisfied_count(&self) -> usize {
        ResearchCategory::ALL.len() - self.missing().len()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn any(&self) -> bool {
        self.satisfied_count() > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    Saneloop,
    Plan,
    BugNote,
    Verify,
}

impl RequirementKind {
    pub const ALL: [RequirementKind; 4] = [Self::Saneloop, Self::Plan, Self::BugNote, Self::Verify];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Saneloop => "saneloop",
            Self::Plan => "plan",
            Self::BugNote => "bug_note",
            Self::Verify => "verify",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "saneloop" => Ok(Self::Saneloop),
            "plan" => Ok(Self::Plan),
            "bug_note" | "bugnote" => Ok(Self::BugNote),
            "verify" => Ok(Self::Verify),
            _ => Err("requirement must be one of: saneloop, plan, bug_note, verify".to_string()),
        }
    }

    pub fn remedy(self) -> &'static str {
        match self {
            Self::Saneloop => "start a saneloop (`saneloop start`) before editing",
            Self::Plan => "write a plan file (e.g. PLAN.md) before editing",
            Self::BugNote => "record the bug in memory (mcp__memory__add_observations) first",
            Self::Verify => "run the test/verify command and get a passing result first",
        }
    }
}

impl std::fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(default)]
    pub requested: BTreeSet<RequirementKind>,
    #[serde(default)]
    pub satisfied: BTreeSet<RequirementKind>,
}

impl Requirements {
    pub fn request(&mut self, kind: RequirementKind) {
        self.requested.insert(kind);
        self.satisfied.remove(&kind);
    }

    pub fn satisfy(&mut self, kind: RequirementKind) -> bool {
        self.satisfied.insert(kind)
    }

    pub fn is_satisfied(&self, kind: RequirementKind) -> bool {
        self.satisfied.contains(&kind)
    }

    pub fn unsatisfied(&self) -> Vec<RequirementKind> {
        self.requested
            .iter()
            .filter(|kind| !self.satisfied.contains(kind))
            .copied()
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditLedger {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub unique_files: BTreeSet<String>,
}

impl EditLedger {
    pub fn record(&mut self, path: Option<&str>) {
        self.count = self.count.saturating_add(1);
        if let Some(path) = path.filter(|p| !p.trim().is_empty()) {
            self.unique_files.insert(path.to_string());
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaneloopState {
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptAnnotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_kind: Option<PromptKind>,
    #[serde(default)]
    pub triggers: BTreeSet<String>,
    #[serde(default)]
    pub frustration: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub tool: String,
    pub rule: String,
    pub reason: String,
    pub at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditHistory {
    #[serde(default)]
    pub scores: Vec<u8>,
    #[serde(default)]
    pub streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_audited_at: Option<String>,
}

impl AuditHistory {
    pub fn record(&mut self, score: Option<u8>, clean: bool, now: &str) {
        if let Some(score) = score {
            self.scores.push(score);
            if self.scores.len() > MAX_SCORE_HISTORY {
                let excess = self.scores.len() - MAX_SCORE_HISTORY;
                self.scores.drain(..excess);
            }
        }
        self.streak = if clean { self.streak.saturating_add(1) } else { 0 };
        self.last_audited_at = Some(now.to_string());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub session: SessionMeta,
    #[serde(default)]
    pub research: ResearchFlags,
    #[serde(default)]
    pub requirements: Requirements,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerState,
    #[serde(default)]
    pub edits: EditLedger,
    #[serde(default)]
    pub is_big_task: bool,
    #[serde(default)]
    pub saneloop: SaneloopState,
    #[serde(default)]
    pub prompt: PromptAnnotation,
    #[serde(default)]
    pub violations: Vec<ViolationRecord>,
    #[serde(default)]
    pub audit: AuditHistory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

fn default_schema_version() -> u32 {
    STATE_SCHEMA_VERSION
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            version: 0,
            session: SessionMeta::default(),
            research: ResearchFlags::default(),
            requirements: Requirements::default(),
            circuit_breaker: CircuitBreakerState::default(),
            edits: EditLedger::default(),
            is_big_task: false,
            saneloop: SaneloopState::default(),
            prompt: PromptAnnotation::default(),
            violations: Vec::new(),
            audit: AuditHistory::default(),
            signature: None,
        }
    }
}

impl SessionState {
    pub fn fresh(now: &str) -> Self {
        let mut state = Self::default();
        state.session.started_at = Some(now.to_string());
        state
    }

    pub fn reset_session(&mut self, now: &str, session_id: Option<String>) {
        let circuit_breaker = std::mem::take(&mut self.circuit_breaker);
        let audit = std::mem::take(&mut self.audit);
        let version = self.version;
        *self = Self::fresh(now);
        self.session.session_id = session_id;
        self.circuit_breaker = circuit_breaker;
        self.audit = audit;
        self.version = version;
    }

    pub fn record_violation(&mut self, tool: &str, rule: &str, reason: &str, now: &str) {
        self.violations.push(ViolationRecord {
            tool: tool.to_string(),
            rule: rule.to_string(),
            reason: reason.to_string(),
            at: now.to_string(),
        });
        if self.violations.len() > MAX_VIOLATIONS {
            let excess = self.violations.len() - MAX_VIOLATIONS;
            self.violations.drain(..excess);
        }
    }
}
