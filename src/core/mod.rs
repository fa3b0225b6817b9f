// Public modules
pub mod channel;
pub mod config;
pub mod deploy;
pub mod error;
pub mod health;
pub mod pipeline;
pub mod report;
pub mod step;
pub mod target;

// Internal modules - not part of public API
pub(crate) mod paths;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
