//! Generic utility primitives with zero domain knowledge.
//!
//! - `command` - Local command execution with error handling
//! - `shell` - Shell escaping and quoting
//! - `validation` - Input validation helpers

pub mod command;
pub mod shell;
pub mod validation;
