pub mod defaults;
pub mod deploy;
pub mod environment;
pub mod error;
pub mod lifecycle;
pub mod note;
pub mod remote;
pub mod runner;
pub mod session;
pub mod ssh;
pub mod task;
pub mod tracking;

// Internal modules - not part of public API
pub(crate) mod paths;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
