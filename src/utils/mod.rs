//! Generic utility primitives with zero domain knowledge.
//!
//! - `shell` - Shell escaping and command composition
//! - `template` - String template rendering

pub mod shell;
pub mod template;
