//! Hardware-facing traits and error types.
//!
//! The control core talks to its collaborators only through these traits:
//! - `TelemetrySource` - last sampled analog values (non-blocking)
//! - `PwmOutput` - switching timer and indicator lines
//! - `NvStorage` - non-volatile copy of the retained record
//! - `RetainedMemory` - memory that survives a reset but not power loss
//! - `StatusSink` - diagnostic text output
//!
//! Every trait is `Send + Sync`: the control task and the command path hold
//! the same backend behind an `Arc`.

use thiserror::Error;

use super::config::PwmTiming;
use crate::control::retained::RetainedRecord;

/// Error types for hardware operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HalError {
    /// Backend initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Hardware communication error
    #[error("Hardware communication error: {0}")]
    CommunicationError(String),

    /// State persistence error
    #[error("State persistence error: {0}")]
    PersistenceError(String),
}

/// Indicator lines driven by the actuator and the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Indicator {
    /// Red: thermal limiting in progress.
    Limiting = 0,
    /// Green: output is switching.
    Active = 1,
}

/// Analog telemetry source.
///
/// Returns the last sampled value; never blocks.
pub trait TelemetrySource: Send + Sync {
    /// Temperature of sensor `sensor_index` [°C].
    fn read_temperature(&self, sensor_index: usize) -> f32;

    /// DC bus (input) voltage [V].
    fn read_bus_voltage(&self) -> f32;

    /// Input current [A].
    fn read_input_current(&self) -> f32;
}

/// Switching output.
///
/// `set_compare` must be a single register write: it is called from both
/// the control task and the command path without a lock.
pub trait PwmOutput: Send + Sync {
    /// Program the timer. Called once before the control loop starts.
    fn configure(&self, timing: PwmTiming) -> Result<(), HalError>;

    /// Set the compare value [ticks] and latch it with an update event.
    fn set_compare(&self, ticks: u32);

    /// Drive an indicator line.
    fn set_indicator(&self, indicator: Indicator, on: bool);
}

/// Non-volatile storage for the retained record.
pub trait NvStorage: Send + Sync {
    /// Load the stored record. `Ok(None)` when nothing has been stored.
    fn load_record(&self) -> Result<Option<RetainedRecord>, HalError>;

    /// Store the record, replacing any previous copy.
    fn save_record(&self, record: &RetainedRecord) -> Result<(), HalError>;
}

/// Memory preserved across resets but not across power loss.
pub trait RetainedMemory: Send + Sync {
    /// Read the retained image. `Ok(None)` when the region holds nothing usable.
    fn read(&self) -> Result<Option<RetainedRecord>, HalError>;

    /// Write the retained image.
    fn write(&self, record: &RetainedRecord) -> Result<(), HalError>;
}

/// Diagnostic text sink. Not on the control-correctness path.
pub trait StatusSink: Send + Sync {
    /// Emit one line.
    fn report(&self, line: &str);
}
