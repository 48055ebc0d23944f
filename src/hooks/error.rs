use crate::config::ConfigError;
use crate::state::StateError;

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("unknown hook event `{0}`")]
    UnknownEvent(String),
    #[error("hook payload is empty")]
    EmptyPayload,
    #[error("malformed hook payload: {0}")]
    Payload(#[source] serde_json::Error),
    #[error("hook payload must be a JSON object, got {0}")]
    PayloadShape(&'static str),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    State(#[from] StateError),
}
