//! # Braking Resistor HAL
//!
//! Host implementations of the hardware traits defined in
//! `brake_common::hal::driver`.
//!
//! # Module Structure
//!
//! - [`drivers`] - Simulated power stage (`TelemetrySource` + `PwmOutput`)
//! - [`storage`] - Non-volatile and retained record storage
//! - [`status`] - Status sinks
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                  brake_control_unit                       │
//! │      cycle runner        command authority    recovery    │
//! └──────┬──────────────────────────┬──────────────────┬──────┘
//!        │ TelemetrySource          │ StatusSink       │ NvStorage
//!        │ PwmOutput                │                  │ RetainedMemory
//!        ▼                          ▼                  ▼
//! ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │ SimulationDriver │   │ Tracing / Stdout │   │ FileStorage      │
//! │  (PowerStage)    │   │ / Buffer sinks   │   │ FileRetained     │
//! └──────────────────┘   └──────────────────┘   └──────────────────┘
//! ```

pub mod drivers;
pub mod status;
pub mod storage;

pub use crate::drivers::simulation::{PlantParams, SimulationDriver};
pub use crate::status::{BufferSink, StdoutSink, TracingSink};
pub use crate::storage::{FileRetained, FileStorage, MemoryStorage};
