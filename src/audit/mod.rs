pub mod summary;

pub use summary::{parse_summary, ParsedSummary};

use crate::config::AuditSettings;
use crate::state::{RequirementKind, SessionState};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopVerdict {
    AllowStop,
    BlockStop,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopInput {
    pub summary: Option<String>,
    pub compliance_score: Option<u8>,
    pub reported_violations: Option<usize>,
    pub stop_hook_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditOutcome {
    pub verdict: StopVerdict,
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
    pub score: Option<u8>,
}

impl AuditOutcome {
    pub fn is_blocked(&self) -> bool {
        self.verdict == StopVerdict::BlockStop
    }
}

#[derive(Debug, Clone)]
pub struct SessionAuditor {
    settings: AuditSettings,
}

impl SessionAuditor {
    pub fn new(settings: AuditSettings) -> Self {
        Self { settings }
    }

    pub fn audit(&self, input: &StopInput, state: &SessionState) -> AuditOutcome {
        let mut reasons = Vec::new();
        let mut warnings = Vec::new();
        let summary = input
            .summary
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty());

        let mut score = input.compliance_score;
        match summary {
            None if state.edits.count > 0 => reasons.push(format!(
                "{} edit(s) this session but no summary was written; summarize what changed and rate compliance (Score: N/10)",
                state.edits.count
            )),
            None => {}
            Some(text) => {
                let parsed = parse_summary(text);
                score = score.or(parsed.score);
                self.check_summary(&parsed, score, input, state, &mut reasons, &mut warnings);
            }
        }

        if let Some(score) = score {
            check_score_consistency(score, state, &mut reasons);
            if score > self.settings.max_score {
                reasons.push(format!(
                    "score {score} is outside the 0-{} scale",
                    self.settings.max_score
                ));
            }
            self.check_inflation(score, state, &mut warnings);
        }

        let verdict = if reasons.is_empty() {
            StopVerdict::AllowStop
        } else if input.stop_hook_active {
            warnings.extend(
                reasons
                    .drain(..)
                    .map(|reason| format!("not blocking (stop hook already active): {reason}")),
            );
            StopVerdict::AllowStop
        } else {
            StopVerdict::BlockStop
        };

        AuditOutcome {
            verdict,
            reasons,
            warnings,
            score,
        }
    }

    // Records the rating and opens a fresh session; breaker and history survive.
    pub fn finalize(&self, outcome: &AuditOutcome, state: &mut SessionState, now: &str) {
        if outcome.is_blocked() {
            return;
        }
        let clean = state.violations.is_empty();
        state.audit.record(outcome.score, clean, now);
        state.reset_session(now, None);
    }

    fn check_summary(
        &self,
        parsed: &ParsedSummary,
        score: Option<u8>,
        input: &StopInput,
        state: &SessionState,
        reasons: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) {
        let logged = state.violations.len();
        if score.is_none() {
            warnings.push("summary has no compliance score (Score: N/10)".to_string());
        }

        if let Some(reported) = input.reported_violations {
            if reported < logged {
                reasons.push(format!(
                    "summary reports {reported} violation(s) but {logged} were logged"
                ));
            }
        }

        for citation in parsed.rules.iter().filter(|citation| !citation.admitted) {
            match rule_evidence(citation.number, state) {
                Some(true) => {}
                Some(false) => reasons.push(format!(
                    "`{}` is cited as followed but there is no logged evidence for it",
                    citation.text
                )),
                None => reasons.push(format!("`{}` is not a known rule", citation.text)),
            }
        }

        for citation in &parsed.files {
            if !edited_file_matches(&citation.file, state) {
                reasons.push(format!(
                    "`{}:{}` cites a file that was not edited this session",
                    citation.file, citation.line
                ));
            }
        }

        for phrase in &parsed.weasels {
            reasons.push(format!(
                "hedged compliance claim (\"{phrase}\"); state plainly which rules were followed or broken"
            ));
        }

        if let Some(claimed) = parsed.streak {
            if claimed != state.audit.streak {
                warnings.push(format!(
                    "claimed streak {claimed} but the recorded streak is {}",
                    state.audit.streak
                ));
            }
        }
    }

    fn check_inflation(&self, score: u8, state: &SessionState, warnings: &mut Vec<String>) {
        let run = state
            .audit
            .scores
            .iter()
            .rev()
            .take_while(|past| **past >= self.settings.max_score)
            .count();
        let run = if score >= self.settings.max_score {
            run + 1
        } else {
            0
        };
        if run >= self.settings.inflation_run {
            warnings.push(format!(
                "{run} consecutive maximal ratings; ratings look inflated"
            ));
        }
    }
}

fn check_score_consistency(score: u8, state: &SessionState, reasons: &mut Vec<String>) {
    let logged = state.violations.len();
    if score >= 9 && logged > 0 {
        reasons.push(format!(
            "self-rated {score}/10 but {logged} violation(s) were logged this session"
        ));
    } else if score <= 3 && logged == 0 {
        reasons.push(format!(
            "self-rated {score}/10 but no violations were logged; the rating is inconsistent with the log"
        ));
    }
}

fn rule_evidence(number: u32, state: &SessionState) -> Option<bool> {
    let requirements = &state.requirements;
    match number {
        1 => Some(state.research.any()),
        2 => Some(requirements.is_satisfied(RequirementKind::Verify)),
        3 => Some(requirements.is_satisfied(RequirementKind::Plan)),
        4 => Some(requirements.is_satisfied(RequirementKind::BugNote)),
        5 => Some(
            state.saneloop.active || requirements.is_satisfied(RequirementKind::Saneloop),
        ),
        _ => None,
    }
}

fn edited_file_matches(cited: &str, state: &SessionState) -> bool {
    let cited = cited.trim_start_matches("./");
    state.edits.unique_files.iter().any(|edited| {
        edited == cited
            || edited
                .strip_suffix(cited)
                .is_some_and(|prefix| prefix.ends_with('/'))
    })
}
