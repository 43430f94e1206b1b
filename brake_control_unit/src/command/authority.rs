//! Command authority.
//!
//! Runs outside the control task. Duty requests go straight to the
//! actuator; configuration updates are validated, clamped to the hardware
//! envelope and published to the live configuration.

use std::sync::Arc;
use std::time::Duration;

use brake_common::control::config::ResistorConfig;
use brake_common::hal::config::HardwareDescriptor;
use tracing::{debug, info};

use crate::control::output::Actuator;
use crate::error::CommandError;
use crate::persist::store::PersistedState;
use crate::state::{LiveConfig, StatusSnapshot};

/// Interval at which a held duty is re-requested.
pub const DUTY_REFRESH_INTERVAL: Duration = Duration::from_millis(200);

/// External command path into the controller.
pub struct CommandAuthority {
    actuator: Actuator,
    live: Arc<LiveConfig>,
    persisted: Arc<PersistedState>,
    hw: HardwareDescriptor,
}

impl CommandAuthority {
    pub fn new(
        actuator: Actuator,
        live: Arc<LiveConfig>,
        persisted: Arc<PersistedState>,
        hw: HardwareDescriptor,
    ) -> Self {
        Self {
            actuator,
            live,
            persisted,
            hw,
        }
    }

    // ── Duty ──

    /// Request a duty fraction. Returns the duty actually applied.
    pub fn request_duty(&self, fraction: f32) -> f32 {
        let applied = self.actuator.set_duty(fraction);
        debug!(requested = fraction, applied, "duty requested");
        applied
    }

    /// Hold `fraction` for `duration`, then force the output to zero.
    ///
    /// Blocks the calling context. The duty is re-requested every
    /// [`DUTY_REFRESH_INTERVAL`] so neither the dead-man timeout nor a
    /// passing limit leaves it reduced.
    pub fn request_duty_with_timeout(&self, fraction: f32, duration: Duration) {
        self.hold_duty(fraction, duration, DUTY_REFRESH_INTERVAL, |_| {});
    }

    /// Hold `fraction` for `duration`, re-requesting every `interval`.
    ///
    /// `on_tick` runs before each refresh with the time still remaining.
    pub fn hold_duty<F>(&self, fraction: f32, duration: Duration, interval: Duration, mut on_tick: F)
    where
        F: FnMut(Duration),
    {
        let interval = if interval.is_zero() { duration } else { interval };
        self.request_duty(fraction);

        let mut remaining = duration;
        while !remaining.is_zero() {
            on_tick(remaining);
            remaining = remaining.saturating_sub(interval);
            self.actuator.set_duty(fraction);
            std::thread::sleep(interval);
        }

        self.actuator.set_duty(0.0);
        info!(fraction, ?duration, "timed duty finished");
    }

    // ── Configuration ──

    /// Current live configuration.
    pub fn config(&self) -> ResistorConfig {
        self.live.load()
    }

    /// Validate, clamp and publish a new configuration.
    ///
    /// Returns the configuration as applied.
    ///
    /// # Errors
    /// `CommandError::InvalidConfig` when an ordering or range rule fails;
    /// the live configuration is left untouched.
    pub fn set_config(&self, config: ResistorConfig) -> Result<ResistorConfig, CommandError> {
        config.validate()?;
        let mut applied = config;
        applied.apply_hw_limits(&self.hw);
        self.live.store(&applied);
        info!(controller_id = applied.controller_id, "configuration updated");
        Ok(applied)
    }

    /// Persist the live configuration. Returns the new write count.
    pub fn store_config(&self) -> Result<u32, CommandError> {
        let count = self.persisted.store(&self.live.load())?;
        Ok(count)
    }

    /// Controller state snapshot.
    pub fn status(&self) -> StatusSnapshot {
        self.actuator.state().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brake_common::clock::ManualClock;
    use brake_common::control::config::FactoryDefaults;
    use brake_hal::{MemoryStorage, SimulationDriver};
    use crate::state::ControllerState;

    fn authority() -> (CommandAuthority, Arc<MemoryStorage>) {
        let hw = HardwareDescriptor::default();
        let state = Arc::new(ControllerState::new(0));
        let actuator = Actuator::new(
            Arc::new(SimulationDriver::default()),
            Arc::new(ManualClock::new(0)),
            state,
            &hw,
        )
        .unwrap();
        let nv = Arc::new(MemoryStorage::new());
        let (persisted, _) = PersistedState::open(
            Arc::new(MemoryStorage::new()),
            nv.clone(),
            &FactoryDefaults::default(),
            &hw,
        );
        let live = Arc::new(LiveConfig::new(&persisted.config()));
        (
            CommandAuthority::new(actuator, live, Arc::new(persisted), hw),
            nv,
        )
    }

    #[test]
    fn duty_request_is_clamped() {
        let (auth, _) = authority();
        assert_eq!(auth.request_duty(1.7), 1.0);
        assert_eq!(auth.status().pwm_current, 1.0);
    }

    #[test]
    fn timed_duty_ends_at_zero() {
        let (auth, _) = authority();
        let mut ticks = Vec::new();
        auth.hold_duty(
            0.6,
            Duration::from_millis(30),
            Duration::from_millis(10),
            |left| ticks.push(left),
        );
        assert_eq!(
            ticks,
            vec![
                Duration::from_millis(30),
                Duration::from_millis(20),
                Duration::from_millis(10)
            ]
        );
        assert_eq!(auth.status().pwm_current, 0.0);
    }

    #[test]
    fn invalid_config_rejected_and_live_untouched() {
        let (auth, _) = authority();
        let before = auth.config();
        let bad = ResistorConfig {
            temp_lim_start: 90.0,
            temp_lim_end: 40.0,
            ..before
        };
        let err = auth.set_config(bad).unwrap_err();
        assert!(matches!(err, CommandError::InvalidConfig(_)));
        assert_eq!(auth.config(), before);
    }

    #[test]
    fn accepted_config_is_clamped_and_stored() {
        let (auth, nv) = authority();
        let cfg = ResistorConfig {
            load_volt_start: 85.0,
            load_volt_max: 200.0,
            load_volt_max_fraction: 0.5,
            ..auth.config()
        };
        let applied = auth.set_config(cfg).unwrap();
        assert_eq!(applied.load_volt_max, 90.0);
        assert_eq!(auth.config(), applied);

        assert_eq!(auth.store_config().unwrap(), 1);
        assert_eq!(nv.snapshot().unwrap().config, applied);
    }
}
