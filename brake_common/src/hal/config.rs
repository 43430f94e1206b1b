//! Hardware descriptor.
//!
//! Per-board parameters that the firmware used to select with preprocessor
//! tables. Loaded from the `[hardware]` section of the unit configuration
//! and passed to the actuator and the recovery routine at init.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::consts::VAR_INIT_CODE;

/// Timer programming derived from a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmTiming {
    /// Auto-reload value: counter ticks per switching period.
    pub period_ticks: u32,
    /// Complementary output dead time [ticks].
    pub deadtime_ticks: u32,
}

/// Board description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HardwareDescriptor {
    /// Board name.
    pub name: String,
    /// Timer input clock [Hz].
    pub core_clock_hz: u32,
    /// PWM switching frequency [Hz].
    pub switching_frequency_hz: u32,
    /// Dead time between complementary outputs [ns].
    pub deadtime_ns: u32,
    /// Number of temperature sensors whose maximum feeds the thermal limit.
    pub temp_sensor_count: usize,
    /// Unique device id, used to derive the default controller id.
    pub uid: [u8; 12],
    /// Highest temperature limit the board accepts [°C].
    pub temp_abs_max_c: f32,
    /// Highest input voltage the board is rated for [V].
    pub v_in_max: f32,
    /// Marker for the hardware blob; `None` uses the generic init marker.
    pub hw_config_init_flag: Option<u32>,
}

impl Default for HardwareDescriptor {
    fn default() -> Self {
        Self {
            name: "hm1".to_string(),
            core_clock_hz: 80_000_000,
            switching_frequency_hz: 150_000,
            deadtime_ns: 300,
            temp_sensor_count: 3,
            uid: [0; 12],
            temp_abs_max_c: 120.0,
            v_in_max: 90.0,
            hw_config_init_flag: None,
        }
    }
}

impl HardwareDescriptor {
    /// Validate descriptor bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.switching_frequency_hz == 0 || self.switching_frequency_hz >= self.core_clock_hz {
            return Err(ConfigError::ValidationError(format!(
                "switching_frequency_hz {} must be in (0, core_clock_hz {})",
                self.switching_frequency_hz, self.core_clock_hz
            )));
        }
        if self.temp_sensor_count == 0 {
            return Err(ConfigError::ValidationError(
                "temp_sensor_count must be at least 1".to_string(),
            ));
        }
        if !(self.temp_abs_max_c > 0.0) || !(self.v_in_max > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "temp_abs_max_c {} and v_in_max {} must be positive",
                self.temp_abs_max_c, self.v_in_max
            )));
        }
        let timing = self.pwm_timing();
        if timing.deadtime_ticks >= timing.period_ticks {
            return Err(ConfigError::ValidationError(format!(
                "deadtime_ns {} does not fit in a {} Hz period",
                self.deadtime_ns, self.switching_frequency_hz
            )));
        }
        Ok(())
    }

    /// Timer period and dead time for an undivided up-counter.
    pub fn pwm_timing(&self) -> PwmTiming {
        let freq = self.switching_frequency_hz.max(1);
        let period_ticks = (self.core_clock_hz / freq).saturating_sub(1);
        let deadtime_ticks =
            (self.deadtime_ns as u64 * self.core_clock_hz as u64 / 1_000_000_000) as u32;
        PwmTiming {
            period_ticks,
            deadtime_ticks,
        }
    }

    /// Controller id derived from the device uid (7 bits).
    pub fn default_controller_id(&self) -> u8 {
        (crc32c(&self.uid) & 0x7F) as u8
    }

    /// Init marker expected on the hardware blob.
    pub fn hw_config_init_flag(&self) -> u32 {
        self.hw_config_init_flag.unwrap_or(VAR_INIT_CODE)
    }
}

/// CRC-32C (Castagnoli), reflected, init and xor-out 0xFFFFFFFF.
fn crc32c(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0x82F6_3B78 & mask);
        }
    }
    !crc
}
