#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to create state directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read session state {path}: {source}")]
    ReadState {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write session state {path}: {source}")]
    WriteState {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode session state: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write lock file {path}: {source}")]
    WriteLock {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("timed out after {waited_ms}ms waiting for state lock {path}")]
    LockTimeout { path: String, waited_ms: u64 },
    #[error("failed to read hook secret {path}: {source}")]
    ReadSecret {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write hook secret {path}: {source}")]
    WriteSecret {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("hook secret {path} is invalid: {reason}")]
    InvalidSecret { path: String, reason: String },
    #[error("failed to generate hook secret: {0}")]
    GenerateSecret(String),
}

impl StateError {
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}
