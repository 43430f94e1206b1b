//! Controller-level shared types.
//!
//! - [`config`] - Controller configuration (thresholds, identity, baud)
//! - [`retained`] - Retained record with per-field init markers

pub mod config;
pub mod retained;
