//! Prelude module for common re-exports.
//!
//! ```rust
//! use brake_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};
pub use crate::control::config::{CanBaud, FactoryDefaults, ResistorConfig};
pub use crate::control::retained::{RecordFields, RetainedRecord};

// ─── Hardware ───────────────────────────────────────────────────────
pub use crate::hal::config::HardwareDescriptor;
pub use crate::hal::driver::{
    HalError, Indicator, NvStorage, PwmOutput, RetainedMemory, StatusSink, TelemetrySource,
};

// ─── Time ───────────────────────────────────────────────────────────
pub use crate::clock::{Clock, ManualClock, MonotonicClock};
pub use crate::sync::AtomicF32;

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{CYCLE_TIME_US, DEADMAN_TIMEOUT_S};
