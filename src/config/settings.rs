use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub breaker: BreakerSettings,
    #[serde(default)]
    pub lock: LockSettings,
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub audit: AuditSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BreakerSettings {
    #[serde(default = "default_breaker_threshold")]
    pub threshold: u32,
    #[serde(default = "default_breaker_window")]
    pub window: usize,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            threshold: default_breaker_threshold(),
            window: default_breaker_window(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LockSettings {
    #[serde(default = "default_lock_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_lock_poll_ms")]
    pub poll_ms: u64,
    #[serde(default = "default_lock_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_lock_timeout_ms(),
            poll_ms: default_lock_poll_ms(),
            stale_after_secs: default_lock_stale_after_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PathSettings {
    #[serde(default)]
    pub extra_blocked: Vec<String>,
    #[serde(default)]
    pub extra_safe_sinks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuditSettings {
    #[serde(default)]
    pub summary_file: Option<String>,
    #[serde(default = "default_inflation_run")]
    pub inflation_run: usize,
    #[serde(default = "default_max_score")]
    pub max_score: u8,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            summary_file: None,
            inflation_run: default_inflation_run(),
            max_score: default_max_score(),
        }
    }
}

fn default_breaker_threshold() -> u32 {
    3
}

fn default_breaker_window() -> usize {
    5
}

fn default_lock_timeout_ms() -> u64 {
    2_000
}

fn default_lock_poll_ms() -> u64 {
    20
}

fn default_lock_stale_after_secs() -> u64 {
    10
}

fn default_inflation_run() -> usize {
    5
}

fn default_max_score() -> u8 {
    10
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.breaker.threshold < 2 {
            return Err(ConfigError::Settings(
                "`breaker.threshold` must be at least 2".to_string(),
            ));
        }
        if self.breaker.window < self.breaker.threshold as usize {
            return Err(ConfigError::Settings(
                "`breaker.window` must be at least `breaker.threshold`".to_string(),
            ));
        }
        if self.lock.timeout_ms == 0 || self.lock.poll_ms == 0 {
            return Err(ConfigError::Settings(
                "`lock.timeout_ms` and `lock.poll_ms` must be positive".to_string(),
            ));
        }
        if self.lock.poll_ms > self.lock.timeout_ms {
            return Err(ConfigError::Settings(
                "`lock.poll_ms` must not exceed `lock.timeout_ms`".to_string(),
            ));
        }
        if self.audit.max_score == 0 {
            return Err(ConfigError::Settings(
                "`audit.max_score` must be positive".to_string(),
            ));
        }
        if self.audit.inflation_run < 2 {
            return Err(ConfigError::Settings(
                "`audit.inflation_run` must be at least 2".to_string(),
            ));
        }
        for entry in self
            .paths
            .extra_blocked
            .iter()
            .chain(self.paths.extra_safe_sinks.iter())
        {
            if entry.trim().is_empty() {
                return Err(ConfigError::Settings(
                    "path entries must be non-empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
