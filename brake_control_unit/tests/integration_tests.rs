//! Integration tests for the braking resistor control unit.
//!
//! These tests wire the whole unit over in-memory backends and a manual
//! clock, then drive it through realistic sequences spanning limits,
//! dead-man, load shedding, recovery and the terminal.

mod integration;
