//! Simulation driver module.
//!
//! Software power stage for running the controller on a host without the
//! braking resistor board.

mod driver;
mod physics;

pub use driver::SimulationDriver;
pub use physics::{PlantParams, PowerStage};
