use super::integrity::{IntegrityKey, IntegrityStatus};
use super::lock::{LockOptions, StateLock};
use super::{SessionState, StateError};
use crate::breaker::ErrorSignature;
use crate::config::{HookPaths, Settings};
use crate::shared::clock::now_rfc3339;
use crate::shared::fs_atomic::atomic_write_json;
use crate::shared::logging::HookLog;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Fresh,
    Loaded,
    RecoveredCorrupt,
    IntegrityRejected(IntegrityStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedState {
    pub state: SessionState,
    pub status: LoadStatus,
}

#[derive(Debug)]
pub struct StateStore {
    state_file: PathBuf,
    lock_file: PathBuf,
    key: IntegrityKey,
    lock: LockOptions,
    log: HookLog,
}

impl StateStore {
    pub fn new(
        state_file: impl Into<PathBuf>,
        lock_file: impl Into<PathBuf>,
        key: IntegrityKey,
        lock: LockOptions,
        log: HookLog,
    ) -> Self {
        Self {
            state_file: state_file.into(),
            lock_file: lock_file.into(),
            key,
            lock,
            log,
        }
    }

    pub fn open(
        paths: &HookPaths,
        settings: &Settings,
        test_mode: bool,
        log: HookLog,
    ) -> Result<Self, StateError> {
        let key = IntegrityKey::load_or_create(&paths.secret)?;
        Ok(Self::new(
            paths.state_file(),
            paths.lock_file(),
            key,
            LockOptions::from_settings(&settings.lock, test_mode),
            log,
        ))
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    pub fn load(&self) -> Result<LoadedState, StateError> {
        let raw = match fs::read_to_string(&self.state_file) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(LoadedState {
                    state: SessionState::fresh(&now_rfc3339()),
                    status: LoadStatus::Fresh,
                })
            }
            Err(source) => {
                return Err(StateError::ReadState {
                    path: self.state_file.display().to_string(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(LoadedState {
                state: SessionState::fresh(&now_rfc3339()),
                status: LoadStatus::Fresh,
            });
        }

        let parsed: SessionState = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.log.warn(
                    "state.corrupt",
                    &format!(
                        "path={} error={err}; reinitializing session state",
                        self.state_file.display()
                    ),
                );
                return Ok(LoadedState {
                    state: SessionState::fresh(&now_rfc3339()),
                    status: LoadStatus::RecoveredCorrupt,
                });
            }
        };

        match self.key.verify(&parsed)? {
            IntegrityStatus::Valid => Ok(LoadedState {
                state: parsed,
                status: LoadStatus::Loaded,
            }),
            status => {
                self.log.error(
                    "state.integrity_rejected",
                    &format!(
                        "path={} status={status:?}; discarding unsigned changes and tripping breaker",
                        self.state_file.display()
                    ),
                );
                Ok(LoadedState {
                    state: quarantine(&parsed, status),
                    status: LoadStatus::IntegrityRejected(status),
                })
            }
        }
    }

    pub fn snapshot(&self) -> Result<SessionState, StateError> {
        Ok(self.load()?.state)
    }

    pub fn transact<T>(
        &self,
        mutate: impl FnOnce(&mut SessionState) -> T,
    ) -> Result<T, StateError> {
        let _guard = StateLock::acquire(&self.lock_file, self.lock)?;
        let loaded = self.load()?;
        let mut state = loaded.state;
        let before = state.clone();
        let output = mutate(&mut state);
        if state != before || loaded.status != LoadStatus::Loaded {
            self.commit(&mut state)?;
        }
        Ok(output)
    }

    fn commit(&self, state: &mut SessionState) -> Result<(), StateError> {
        state.version = state.version.saturating_add(1);
        self.key.seal(state)?;
        atomic_write_json(&self.state_file, state).map_err(|source| StateError::WriteState {
            path: self.state_file.display().to_string(),
            source,
        })
    }
}

// Only fields that add scrutiny survive a rejected document.
fn quarantine(rejected: &SessionState, status: IntegrityStatus) -> SessionState {
    let now = now_rfc3339();
    let mut state = SessionState::fresh(&now);
    state.edits.count = rejected.edits.count;
    state.violations = rejected.violations.clone();
    state.version = rejected.version;
    state
        .circuit_breaker
        .signatures
        .push(ErrorSignature::IntegrityViolation);
    let detail = match status {
        IntegrityStatus::Missing => "missing signature",
        _ => "signature mismatch",
    };
    state.circuit_breaker.trip(
        &format!(
            "state file failed integrity check ({detail}); a human must review it and reset the breaker"
        ),
        &now,
    );
    state
}
