pub mod clock;
pub mod digest;
pub mod fs_atomic;
pub mod logging;
