//! Error types of the control unit.
//!
//! The control path itself is infallible. Errors come only from startup
//! (RT setup, timer programming) and from the command path (configuration
//! validation, storage writes).

use brake_common::config::ConfigError;
use brake_common::hal::driver::HalError;
use thiserror::Error;

/// Errors during RT setup or cycle start.
#[derive(Debug, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),

    /// Output stage could not be initialized.
    #[error("output stage error: {0}")]
    Hal(#[from] HalError),
}

/// Errors returned to the command authority.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// Submitted configuration was rejected.
    #[error("rejected configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// Retained memory or non-volatile storage write failed.
    #[error("storage error: {0}")]
    Storage(#[from] HalError),
}
