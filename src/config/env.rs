use std::ffi::OsString;
use std::path::PathBuf;

pub const TEST_MODE_ENV: &str = "SANEPROCESS_TEST_MODE";
pub const STATE_DIR_ENV: &str = "SANEPROCESS_STATE_DIR";
pub const SECRET_PATH_ENV: &str = "SANEPROCESS_SECRET_PATH";
pub const PROJECT_DIR_ENV: &str = "CLAUDE_PROJECT_DIR";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeEnv {
    pub test_mode: bool,
    pub home: Option<PathBuf>,
    pub project_dir: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub secret_path: Option<PathBuf>,
    pub current_dir: Option<PathBuf>,
}

impl RuntimeEnv {
    pub fn from_process() -> Self {
        Self {
            test_mode: std::env::var_os(TEST_MODE_ENV)
                .map(|value| is_truthy(&value))
                .unwrap_or(false),
            home: non_empty_path(std::env::var_os("HOME")),
            project_dir: non_empty_path(std::env::var_os(PROJECT_DIR_ENV)),
            state_dir: non_empty_path(std::env::var_os(STATE_DIR_ENV)),
            secret_path: non_empty_path(std::env::var_os(SECRET_PATH_ENV)),
            current_dir: std::env::current_dir().ok(),
        }
    }
}

fn non_empty_path(value: Option<OsString>) -> Option<PathBuf> {
    value.filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn is_truthy(value: &OsString) -> bool {
    matches!(
        value.to_string_lossy().trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_values_enable_test_mode() {
        for raw in ["1", "true", "YES", " on "] {
            assert!(is_truthy(&OsString::from(raw)), "{raw}");
        }
        for raw in ["0", "false", "", "off"] {
            assert!(!is_truthy(&OsString::from(raw)), "{raw}");
        }
    }

    #[test]
    fn empty_paths_are_ignored() {
        assert_eq!(non_empty_path(Some(OsString::new())), None);
        assert_eq!(
            non_empty_path(Some(OsString::from("/tmp/x"))),
            Some(PathBuf::from("/tmp/x"))
        );
    }
}
