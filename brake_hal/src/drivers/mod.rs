//! Hardware backends.
//!
//! - [`simulation`] - Software power stage for development and testing

pub mod simulation;
