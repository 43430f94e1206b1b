//! # Braking Resistor Control Unit Library
//!
//! Safety-limiting PWM loop for a braking resistor. A fixed-period cycle
//! filters telemetry, derives thermal and low-voltage allowances, combines
//! them conservatively, enforces a dead-man timeout and optionally sheds
//! bus over-voltage into the resistor. An external command authority may
//! request duty at any time; the actuator clamps every request.
//!
//! ## Modules
//!
//! - [`control`] - Filters, limit curves, load shedding, actuator
//! - [`safety`] - Dead-man timeout
//! - [`state`] - Single-writer shared state and live configuration
//! - [`persist`] - Retained record recovery and storage
//! - [`command`] - Command authority and terminal
//! - [`cycle`] - Fixed-period runner, statistics, RT setup
//! - [`unit`] - Wiring over hardware backends
//!
//! ## No locks on the control path
//!
//! Every shared scalar has one writer and is a relaxed atomic. The only
//! mutex guards the retained record, which the control task never touches.

pub mod command;
pub mod config;
pub mod control;
pub mod cycle;
pub mod error;
pub mod persist;
pub mod safety;
pub mod state;
pub mod unit;
