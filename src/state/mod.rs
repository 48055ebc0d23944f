pub mod error;
pub mod integrity;
pub mod lock;
pub mod store;
pub mod types;

pub use error::StateError;
pub use integrity::{IntegrityKey, IntegrityStatus};
pub use lock::{LockOptions, StateLock};
pub use store::{LoadStatus, LoadedState, StateStore};
pub use types::{
    AuditHistory, EditLedger, PromptAnnotation, Requirements, RequirementKind, ResearchCategory,
    ResearchFlags, SaneloopState, SessionMeta, SessionState, ViolationRecord,
    STATE_SCHEMA_VERSION,
};
