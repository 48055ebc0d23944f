pub mod signature;

pub use signature::{normalize_error, ErrorSignature};

use crate::config::BreakerSettings;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerState {
    #[serde(default)]
    pub tripped: bool,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default)]
    pub signatures: Vec<ErrorSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tripped_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_trip_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerPolicy {
    pub threshold: u32,
    pub window: usize,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self::from(&BreakerSettings::default())
    }
}

impl From<&BreakerSettings> for BreakerPolicy {
    fn from(value: &BreakerSettings) -> Self {
        Self {
            threshold: value.threshold.max(1),
            window: value.window.max(value.threshold as usize),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TripCause {
    ConsecutiveFailures { count: u32 },
    RepeatedSignature { signature: ErrorSignature },
}

impl TripCause {
    pub fn describe(&self) -> String {
        match self {
            Self::ConsecutiveFailures { count } => {
                format!("{count} consecutive failures without a successful tool call")
            }
            Self::RepeatedSignature { signature } => {
                format!("the same error ({signature}) repeated across recent failures")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerTransition {
    Reset,
    Counted { consecutive_failures: u32 },
    Tripped(TripCause),
    StillTripped,
}

impl CircuitBreakerState {
    pub fn record_success(&mut self) -> BreakerTransition {
        self.consecutive_failures = 0;
        if self.tripped {
            BreakerTransition::StillTripped
        } else {
            BreakerTransition::Reset
        }
    }

    pub fn record_failure(
        &mut self,
        signature: ErrorSignature,
        policy: BreakerPolicy,
        now: &str,
    ) -> BreakerTransition {
        self.signatures.push(signature);
        let window = policy.window.max(1);
        if self.signatures.len() > window {
            let excess = self.signatures.len() - window;
            self.signatures.drain(..excess);
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if self.tripped {
            return BreakerTransition::StillTripped;
        }

        match self.trip_cause(policy) {
            Some(cause) => {
                self.trip(&cause.describe(), now);
                BreakerTransition::Tripped(cause)
            }
            None => BreakerTransition::Counted {
                consecutive_failures: self.consecutive_failures,
            },
        }
    }

    // Repeats are checked over the retained window, which survives successes;
    // the consecutive count does not.
    fn trip_cause(&self, policy: BreakerPolicy) -> Option<TripCause> {
        let threshold = policy.threshold as usize;
        if self.signatures.len() >= threshold {
            let recent = &self.signatures[self.signatures.len() - threshold..];
            if recent.iter().all(|signature| *signature == recent[0]) {
                return Some(TripCause::RepeatedSignature {
                    signature: recent[0],
                });
            }
        }
        if self.consecutive_failures >= policy.threshold {
            return Some(TripCause::ConsecutiveFailures {
                count: self.consecutive_failures,
            });
        }
        None
    }

    pub fn trip(&mut self, reason: &str, now: &str) {
        self.tripped = true;
        self.tripped_at = Some(now.to_string());
        self.last_trip_reason = Some(reason.to_string());
    }

    pub fn reset(&mut self) {
        self.tripped = false;
        self.consecutive_failures = 0;
        self.signatures.clear();
        self.tripped_at = None;
        self.last_trip_reason = None;
    }

    pub fn last_signature(&self) -> Option<ErrorSignature> {
        self.signatures.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ErrorSignature::{CommandNotFound as A, FileNotFound as B};

    const NOW: &str = "2026-01-01T00:00:00Z";

    enum Step {
        Fail(ErrorSignature),
        Ok,
    }

    fn run(steps: &[Step]) -> CircuitBreakerState {
        let mut state = CircuitBreakerState::default();
        for step in steps {
            match step {
                Step::Fail(signature) => {
                    state.record_failure(*signature, BreakerPolicy::default(), NOW);
                }
                Step::Ok => {
                    state.record_success();
                }
            }
        }
        state
    }

    // Combination rule: trip when `threshold` failures happen with no success
    // between them (any signature mix), or when the last `threshold` entries of
    // the retained signature window are identical (successes in between do not
    // clear the window).

    #[test]
    fn same_signature_three_times_trips() {
        let state = run(&[Step::Fail(A), Step::Fail(A), Step::Fail(A)]);
        assert!(state.tripped);
        assert_eq!(state.consecutive_failures, 3);
    }

    #[test]
    fn mixed_signatures_trip_on_the_consecutive_count() {
        let mut state = CircuitBreakerState::default();
        state.record_failure(A, BreakerPolicy::default(), NOW);
        state.record_failure(B, BreakerPolicy::default(), NOW);
        let transition = state.record_failure(A, BreakerPolicy::default(), NOW);
        assert_eq!(
            transition,
            BreakerTransition::Tripped(TripCause::ConsecutiveFailures { count: 3 })
        );
    }

    #[test]
    fn mixed_signatures_with_successes_between_do_not_trip() {
        let state = run(&[Step::Fail(A), Step::Ok, Step::Fail(B), Step::Ok, Step::Fail(A)]);
        assert!(!state.tripped);
        assert_eq!(state.consecutive_failures, 1);
        assert_eq!(state.signatures, vec![A, B, A]);
    }

    #[test]
    fn same_signature_with_successes_between_trips_on_the_window() {
        let mut state = run(&[Step::Fail(A), Step::Ok, Step::Fail(A), Step::Ok]);
        let transition = state.record_failure(A, BreakerPolicy::default(), NOW);
        assert_eq!(
            transition,
            BreakerTransition::Tripped(TripCause::RepeatedSignature { signature: A })
        );
        assert_eq!(state.consecutive_failures, 1);
    }

    #[test]
    fn success_resets_count_but_keeps_signature_log() {
        let mut state = run(&[Step::Fail(A), Step::Fail(B)]);
        assert_eq!(state.record_success(), BreakerTransition::Reset);
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.signatures, vec![A, B]);
    }

    #[test]
    fn window_keeps_only_most_recent_signatures() {
        let mut state = CircuitBreakerState::default();
        let policy = BreakerPolicy {
            threshold: 3,
            window: 3,
        };
        for signature in [A, B, A, B] {
            state.record_success();
            state.record_failure(signature, policy, NOW);
        }
        assert_eq!(state.signatures, vec![B, A, B]);
    }

    #[test]
    fn tripped_breaker_stays_tripped_until_reset() {
        let mut state = run(&[Step::Fail(A), Step::Fail(A), Step::Fail(A)]);
        assert_eq!(state.record_success(), BreakerTransition::StillTripped);
        assert!(state.tripped);
        assert_eq!(
            state.record_failure(B, BreakerPolicy::default(), NOW),
            BreakerTransition::StillTripped
        );

        state.reset();
        assert!(!state.tripped);
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.signatures.is_empty());
        assert!(state.last_trip_reason.is_none());
    }
}
