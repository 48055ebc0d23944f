pub mod error;
pub mod protocol;
pub mod runner;

pub use error::HookError;
pub use protocol::{HookEvent, HookPayload, HookResponse, EXIT_ALLOW, EXIT_BLOCK};
pub use runner::{run_hook, HookContext};
