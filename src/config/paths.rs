use crate::config::{ConfigError, RuntimeEnv};
use std::path::{Path, PathBuf};

pub const STATE_DIR_NAME: &str = ".saneprocess";
pub const STATE_FILE_NAME: &str = "state.json";
pub const SETTINGS_FILE_NAME: &str = "config.yaml";
pub const SECRET_FILE_NAME: &str = ".claude_hook_secret";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookPaths {
    pub root: PathBuf,
    pub secret: PathBuf,
}

impl HookPaths {
    pub fn new(root: impl Into<PathBuf>, secret: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            secret: secret.into(),
        }
    }

    pub fn resolve(env: &RuntimeEnv, payload_cwd: Option<&Path>) -> Result<Self, ConfigError> {
        let root = match &env.state_dir {
            Some(dir) => dir.clone(),
            None => resolve_project_dir(env, payload_cwd)?.join(STATE_DIR_NAME),
        };
        let secret = match &env.secret_path {
            Some(path) => path.clone(),
            None => env
                .home
                .as_ref()
                .ok_or(ConfigError::HomeDirectoryUnavailable)?
                .join(SECRET_FILE_NAME),
        };
        Ok(Self { root, secret })
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.join(STATE_FILE_NAME)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(format!("{STATE_FILE_NAME}.lock"))
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE_NAME)
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join("logs/hooks.log")
    }

    pub fn project_dir(&self) -> Option<&Path> {
        self.root.parent()
    }
}

pub fn resolve_project_dir(
    env: &RuntimeEnv,
    payload_cwd: Option<&Path>,
) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = &env.project_dir {
        return Ok(dir.clone());
    }
    if let Some(cwd) = payload_cwd.filter(|p| p.is_absolute()) {
        return Ok(cwd.to_path_buf());
    }
    env.current_dir.clone().ok_or_else(|| {
        ConfigError::ProjectDirectoryUnavailable(
            "no CLAUDE_PROJECT_DIR, payload cwd, or current directory".to_string(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> RuntimeEnv {
        RuntimeEnv {
            home: Some(PathBuf::from("/home/dev")),
            current_dir: Some(PathBuf::from("/work/fallback")),
            ..RuntimeEnv::default()
        }
    }

    #[test]
    fn project_dir_env_wins_over_payload_cwd() {
        let mut env = env();
        env.project_dir = Some(PathBuf::from("/work/app"));
        let paths = HookPaths::resolve(&env, Some(Path::new("/elsewhere"))).expect("paths");
        assert_eq!(paths.state_file(), PathBuf::from("/work/app/.saneprocess/state.json"));
        assert_eq!(paths.secret, PathBuf::from("/home/dev/.claude_hook_secret"));
    }

    #[test]
    fn payload_cwd_used_before_current_dir() {
        let paths = HookPaths::resolve(&env(), Some(Path::new("/work/app"))).expect("paths");
        assert_eq!(paths.root, PathBuf::from("/work/app/.saneprocess"));

        let fallback = HookPaths::resolve(&env(), Some(Path::new("relative"))).expect("paths");
        assert_eq!(fallback.root, PathBuf::from("/work/fallback/.saneprocess"));
    }

    #[test]
    fn overrides_replace_state_dir_and_secret() {
        let mut env = env();
        env.state_dir = Some(PathBuf::from("/tmp/state"));
        env.secret_path = Some(PathBuf::from("/tmp/secret"));
        let paths = HookPaths::resolve(&env, None).expect("paths");
        assert_eq!(paths.lock_file(), PathBuf::from("/tmp/state/state.json.lock"));
        assert_eq!(paths.secret, PathBuf::from("/tmp/secret"));
    }

    #[test]
    fn missing_home_without_secret_override_fails() {
        let env = RuntimeEnv {
            state_dir: Some(PathBuf::from("/tmp/state")),
            ..RuntimeEnv::default()
        };
        assert!(matches!(
            HookPaths::resolve(&env, None),
            Err(ConfigError::HomeDirectoryUnavailable)
        ));
    }
}
