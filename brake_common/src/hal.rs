//! Hardware abstraction types.
//!
//! - [`config`] - Data-driven hardware descriptor (per-board tables)
//! - [`driver`] - Traits implemented by hardware backends and `HalError`

pub mod config;
pub mod driver;
