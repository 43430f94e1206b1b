//! PWM actuator.
//!
//! The only path to the switching output. Every request is clamped into
//! `[0, pwm_allowed_max]`, never rejected.

use std::sync::Arc;

use brake_common::clock::Clock;
use brake_common::consts::ACTIVE_INDICATOR_THRESHOLD;
use brake_common::hal::config::{HardwareDescriptor, PwmTiming};
use brake_common::hal::driver::{HalError, Indicator, PwmOutput};
use tracing::info;

use crate::state::ControllerState;

/// Clamp-and-stamp actuator.
///
/// Cheap to clone; the control task and the command authority each hold one.
#[derive(Clone)]
pub struct Actuator {
    pwm: Arc<dyn PwmOutput>,
    clock: Arc<dyn Clock>,
    state: Arc<ControllerState>,
    timing: PwmTiming,
}

impl Actuator {
    /// Program the timer from the hardware descriptor with the output off.
    pub fn new(
        pwm: Arc<dyn PwmOutput>,
        clock: Arc<dyn Clock>,
        state: Arc<ControllerState>,
        hw: &HardwareDescriptor,
    ) -> Result<Self, HalError> {
        let timing = hw.pwm_timing();
        pwm.configure(timing)?;
        pwm.set_compare(0);
        pwm.set_indicator(Indicator::Active, false);
        pwm.set_indicator(Indicator::Limiting, false);
        info!(
            board = %hw.name,
            switching_hz = hw.switching_frequency_hz,
            period_ticks = timing.period_ticks,
            deadtime_ticks = timing.deadtime_ticks,
            "PWM actuator ready"
        );
        Ok(Self {
            pwm,
            clock,
            state,
            timing,
        })
    }

    /// Apply `requested` duty, clamped to the current ceiling.
    ///
    /// Returns the applied duty. Always stamps the command time.
    pub fn set_duty(&self, requested: f32) -> f32 {
        let max = self.state.pwm_allowed_max();
        let max = if max.is_nan() { 0.0 } else { max.clamp(0.0, 1.0) };
        let duty = if requested.is_nan() {
            0.0
        } else {
            requested.clamp(0.0, max)
        };

        self.state.store_command(duty, self.clock.now_us());
        self.pwm.set_compare(compare_ticks(self.timing.period_ticks, duty));
        self.pwm
            .set_indicator(Indicator::Active, duty > ACTIVE_INDICATOR_THRESHOLD);
        duty
    }

    #[inline]
    pub fn timing(&self) -> PwmTiming {
        self.timing
    }

    /// Drive the limiting indicator.
    #[inline]
    pub fn set_limiting(&self, on: bool) {
        self.pwm.set_indicator(Indicator::Limiting, on);
    }

    #[inline]
    pub fn state(&self) -> &Arc<ControllerState> {
        &self.state
    }

    #[inline]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

/// Compare value for `duty` of a `period_ticks` period, truncated.
#[inline]
pub fn compare_ticks(period_ticks: u32, duty: f32) -> u32 {
    (period_ticks as f32 * duty) as u32
}
