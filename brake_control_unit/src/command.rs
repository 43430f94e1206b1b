//! Command processing root.
//!
//! The command authority is the external path into the core: duty
//! requests and configuration updates. The terminal parses text commands
//! on top of it.

pub mod authority;
pub mod terminal;
