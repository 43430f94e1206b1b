//! Control engine root.
//!
//! Telemetry filter → limit curves → combiner → actuator, plus the
//! automatic load-shedding policy that feeds the same actuator.

pub mod auto_load;
pub mod filters;
pub mod limits;
pub mod output;
