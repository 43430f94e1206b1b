//! Controller configuration.
//!
//! One instance, externally settable through the command authority and
//! persisted inside the retained record. Threshold pairs carry an ordering
//! invariant checked by [`ResistorConfig::validate`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::consts::{DEFAULT_STATUS_RATE_HZ, STATUS_RATE_HZ_MAX};
use crate::hal::config::HardwareDescriptor;

/// Lowest temperature limit accepted after hardware clamping [°C].
const TEMP_LIMIT_FLOOR_C: f32 = -50.0;

// ─── Bus baud rate ──────────────────────────────────────────────────

/// Command bus baud rate selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum CanBaud {
    #[serde(rename = "125k")]
    Baud125K = 0,
    #[serde(rename = "250k")]
    Baud250K = 1,
    #[default]
    #[serde(rename = "500k")]
    Baud500K = 2,
    #[serde(rename = "1m")]
    Baud1M = 3,
    #[serde(rename = "10k")]
    Baud10K = 4,
    #[serde(rename = "20k")]
    Baud20K = 5,
    #[serde(rename = "50k")]
    Baud50K = 6,
    #[serde(rename = "75k")]
    Baud75K = 7,
}

impl CanBaud {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Baud125K),
            1 => Some(Self::Baud250K),
            2 => Some(Self::Baud500K),
            3 => Some(Self::Baud1M),
            4 => Some(Self::Baud10K),
            5 => Some(Self::Baud20K),
            6 => Some(Self::Baud50K),
            7 => Some(Self::Baud75K),
            _ => None,
        }
    }

    /// Line rate in bits per second.
    pub const fn bits_per_second(&self) -> u32 {
        match self {
            Self::Baud125K => 125_000,
            Self::Baud250K => 250_000,
            Self::Baud500K => 500_000,
            Self::Baud1M => 1_000_000,
            Self::Baud10K => 10_000,
            Self::Baud20K => 20_000,
            Self::Baud50K => 50_000,
            Self::Baud75K => 75_000,
        }
    }
}

// ─── Controller configuration ───────────────────────────────────────

/// Limits and identity of one braking resistor controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResistorConfig {
    /// Id on the command bus.
    pub controller_id: u8,
    /// Status broadcast rate [Hz].
    pub status_rate_hz: u32,
    /// Command bus baud rate.
    pub can_baud_rate: CanBaud,

    /// Temperature at which power limiting begins [°C].
    pub temp_lim_start: f32,
    /// Temperature at which power is completely disabled [°C].
    pub temp_lim_end: f32,

    /// Voltage at which power limiting begins [V].
    pub volt_lower_lim_start: f32,
    /// Voltage at which power is completely disabled [V].
    pub volt_lower_lim_end: f32,

    /// Voltage at which automatic load starts getting applied [V].
    pub load_volt_start: f32,
    /// Voltage at which maximum automatic load is applied [V].
    pub load_volt_max: f32,
    /// Automatic load at and above `load_volt_max` (0 disables).
    pub load_volt_max_fraction: f32,
}

impl Default for ResistorConfig {
    fn default() -> Self {
        FactoryDefaults::default().with_controller_id(0)
    }
}

impl ResistorConfig {
    /// Check ordering invariants and ranges.
    ///
    /// # Errors
    /// `ConfigError::ValidationError` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let floats = [
            ("temp_lim_start", self.temp_lim_start),
            ("temp_lim_end", self.temp_lim_end),
            ("volt_lower_lim_start", self.volt_lower_lim_start),
            ("volt_lower_lim_end", self.volt_lower_lim_end),
            ("load_volt_start", self.load_volt_start),
            ("load_volt_max", self.load_volt_max),
            ("load_volt_max_fraction", self.load_volt_max_fraction),
        ];
        for (name, value) in floats {
            if !value.is_finite() {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        if self.temp_lim_start >= self.temp_lim_end {
            return Err(ConfigError::ValidationError(format!(
                "temp_lim_start {} must be below temp_lim_end {}",
                self.temp_lim_start, self.temp_lim_end
            )));
        }
        if self.volt_lower_lim_start <= self.volt_lower_lim_end {
            return Err(ConfigError::ValidationError(format!(
                "volt_lower_lim_start {} must be above volt_lower_lim_end {}",
                self.volt_lower_lim_start, self.volt_lower_lim_end
            )));
        }
        if self.load_volt_start >= self.load_volt_max {
            return Err(ConfigError::ValidationError(format!(
                "load_volt_start {} must be below load_volt_max {}",
                self.load_volt_start, self.load_volt_max
            )));
        }
        if !(0.0..=1.0).contains(&self.load_volt_max_fraction) {
            return Err(ConfigError::ValidationError(format!(
                "load_volt_max_fraction {} out of range [0, 1]",
                self.load_volt_max_fraction
            )));
        }
        if self.status_rate_hz > STATUS_RATE_HZ_MAX {
            return Err(ConfigError::ValidationError(format!(
                "status_rate_hz {} out of range [0, {}]",
                self.status_rate_hz, STATUS_RATE_HZ_MAX
            )));
        }
        Ok(())
    }

    /// Clamp every field into the board's envelope.
    ///
    /// Non-finite values collapse to the conservative end of their range.
    pub fn apply_hw_limits(&mut self, hw: &HardwareDescriptor) {
        let before = *self;
        let t_max = hw.temp_abs_max_c;
        let v_max = hw.v_in_max;
        self.temp_lim_start = clamp_finite(self.temp_lim_start, TEMP_LIMIT_FLOOR_C, t_max);
        self.temp_lim_end = clamp_finite(self.temp_lim_end, TEMP_LIMIT_FLOOR_C, t_max);
        // A NaN lower-voltage limit must deny, so it collapses to the top.
        self.volt_lower_lim_start = clamp_finite_or(self.volt_lower_lim_start, 0.0, v_max, v_max);
        self.volt_lower_lim_end = clamp_finite_or(self.volt_lower_lim_end, 0.0, v_max, v_max);
        self.load_volt_start = clamp_finite_or(self.load_volt_start, 0.0, v_max, v_max);
        self.load_volt_max = clamp_finite_or(self.load_volt_max, 0.0, v_max, v_max);
        self.load_volt_max_fraction = clamp_finite(self.load_volt_max_fraction, 0.0, 1.0);
        self.status_rate_hz = self.status_rate_hz.min(STATUS_RATE_HZ_MAX);
        if *self != before {
            debug!(board = %hw.name, ?before, after = ?self, "config clamped to hardware limits");
        }
    }
}

fn clamp_finite(value: f32, lo: f32, hi: f32) -> f32 {
    clamp_finite_or(value, lo, hi, lo)
}

fn clamp_finite_or(value: f32, lo: f32, hi: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(lo, hi)
    }
}

// ─── Factory defaults ───────────────────────────────────────────────

/// Compiled-in defaults, overridable from the `[defaults]` section of the
/// unit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FactoryDefaults {
    /// Fixed controller id. `None` derives it from the hardware uid.
    pub controller_id: Option<u8>,
    pub status_rate_hz: u32,
    pub can_baud_rate: CanBaud,
    pub temp_lim_start: f32,
    pub temp_lim_end: f32,
    pub volt_lower_lim_start: f32,
    pub volt_lower_lim_end: f32,
    pub load_volt_start: f32,
    pub load_volt_max: f32,
    pub load_volt_max_fraction: f32,
}

impl Default for FactoryDefaults {
    fn default() -> Self {
        Self {
            controller_id: None,
            status_rate_hz: DEFAULT_STATUS_RATE_HZ,
            can_baud_rate: CanBaud::Baud500K,
            temp_lim_start: 60.0,
            temp_lim_end: 80.0,
            volt_lower_lim_start: 10.0,
            volt_lower_lim_end: 8.0,
            load_volt_start: 57.0,
            load_volt_max: 60.0,
            load_volt_max_fraction: 0.0,
        }
    }
}

impl FactoryDefaults {
    /// Default controller id for this board.
    pub fn controller_id(&self, hw: &HardwareDescriptor) -> u8 {
        self.controller_id
            .unwrap_or_else(|| hw.default_controller_id())
    }

    /// Full default configuration for this board.
    pub fn config(&self, hw: &HardwareDescriptor) -> ResistorConfig {
        self.with_controller_id(self.controller_id(hw))
    }

    fn with_controller_id(&self, controller_id: u8) -> ResistorConfig {
        ResistorConfig {
            controller_id,
            status_rate_hz: self.status_rate_hz,
            can_baud_rate: self.can_baud_rate,
            temp_lim_start: self.temp_lim_start,
            temp_lim_end: self.temp_lim_end,
            volt_lower_lim_start: self.volt_lower_lim_start,
            volt_lower_lim_end: self.volt_lower_lim_end,
            load_volt_start: self.load_volt_start,
            load_volt_max: self.load_volt_max,
            load_volt_max_fraction: self.load_volt_max_fraction,
        }
    }
}
