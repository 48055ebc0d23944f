pub mod env;
pub mod error;
pub mod load;
pub mod paths;
pub mod settings;

pub use env::RuntimeEnv;
pub use error::ConfigError;
pub use load::load_settings;
pub use paths::{
    resolve_project_dir, HookPaths, SECRET_FILE_NAME, SETTINGS_FILE_NAME, STATE_DIR_NAME,
    STATE_FILE_NAME,
};
pub use settings::{AuditSettings, BreakerSettings, LockSettings, PathSettings, Settings};
