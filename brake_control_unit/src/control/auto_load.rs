//! Automatic load shedding.
//!
//! When enabled, a rising bus voltage is answered with resistor load
//! independently of the command authority: nothing below
//! `load_volt_start`, a ramp up to `load_volt_max_fraction` at
//! `load_volt_max`, and that fraction beyond it. The target still passes
//! through the actuator, so the combined ceiling bounds it.

use brake_common::consts::AUTO_LOAD_ENABLE_FRACTION;

use super::limits::LimitSet;

/// Whether the configured maximum fraction switches the policy on.
#[inline]
pub fn enabled(load_volt_max_fraction: f32) -> bool {
    load_volt_max_fraction > AUTO_LOAD_ENABLE_FRACTION
}

/// Duty target at the filtered bus voltage.
///
/// `None` when the policy is disabled or the voltage is below the start
/// threshold. A `Some` target of zero also means no action.
pub fn target(limits: &LimitSet, voltage: f32) -> Option<f32> {
    if !enabled(limits.load.allow_at_end) {
        return None;
    }
    if !(voltage >= limits.load_start) {
        return None;
    }
    Some(limits.load.allow(voltage))
}
