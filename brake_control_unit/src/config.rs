//! Unit configuration loader with validation.
//!
//! One TOML file describes the whole unit:
//!
//! ```toml
//! [shared]
//! service_name = "brake-hm1-01"
//!
//! [cycle]
//! period_us = 1000
//! deadman_timeout_s = 2.0
//!
//! [filters]
//! temperature_alpha = 0.05
//!
//! [hardware]
//! name = "hm1"
//! uid = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]
//!
//! [storage]
//! retained_path = "/dev/shm/brake_retained.bin"
//! nv_path = "/var/lib/brake/nv_record.bin"
//!
//! [defaults]
//! temp_lim_start = 60.0
//! temp_lim_end = 80.0
//!
//! [simulation]
//! load_resistance_ohm = 2.0
//! ```
//!
//! Every section is optional and falls back to the compiled-in defaults.

use std::path::{Path, PathBuf};

use brake_common::config::{ConfigError, ConfigLoader, SharedConfig};
use brake_common::consts::{
    CURRENT_FILTER_ALPHA, CYCLE_TIME_US, CYCLE_TIME_US_MAX, CYCLE_TIME_US_MIN, DEADMAN_TIMEOUT_S,
    DEFAULT_NV_PATH, DEFAULT_RETAINED_PATH, MIRROR_PERIOD_MS, REPORT_INTERVAL_CYCLES,
    TEMPERATURE_FILTER_ALPHA, VOLTAGE_FILTER_ALPHA,
};
use brake_common::control::config::FactoryDefaults;
use brake_common::hal::config::HardwareDescriptor;
use brake_hal::PlantParams;
use serde::{Deserialize, Serialize};

// ─── Sections ───────────────────────────────────────────────────────

/// Control cycle timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CycleConfig {
    /// Control period [µs].
    pub period_us: u32,
    /// Dead-man window [s].
    pub deadman_timeout_s: f32,
    /// Period of the identity mirroring pass [ms].
    pub mirror_period_ms: u64,
    /// Status report interval [cycles]. 0 disables the report.
    pub report_interval_cycles: u32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            period_us: CYCLE_TIME_US,
            deadman_timeout_s: DEADMAN_TIMEOUT_S,
            mirror_period_ms: MIRROR_PERIOD_MS,
            report_interval_cycles: REPORT_INTERVAL_CYCLES,
        }
    }
}

/// Per-iteration smoothing constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    pub current_alpha: f32,
    pub temperature_alpha: f32,
    pub voltage_alpha: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            current_alpha: CURRENT_FILTER_ALPHA,
            temperature_alpha: TEMPERATURE_FILTER_ALPHA,
            voltage_alpha: VOLTAGE_FILTER_ALPHA,
        }
    }
}

/// Storage locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Reset-surviving image.
    pub retained_path: PathBuf,
    /// Non-volatile copy.
    pub nv_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            retained_path: PathBuf::from(DEFAULT_RETAINED_PATH),
            nv_path: PathBuf::from(DEFAULT_NV_PATH),
        }
    }
}

/// Complete unit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct UnitConfig {
    pub shared: SharedConfig,
    pub cycle: CycleConfig,
    pub filters: FilterConfig,
    pub hardware: HardwareDescriptor,
    pub storage: StorageConfig,
    pub defaults: FactoryDefaults,
    /// Plant model used with `--simulate`.
    pub simulation: PlantParams,
}

impl UnitConfig {
    /// Check bounds of every section.
    ///
    /// # Errors
    /// `ConfigError::ValidationError` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.hardware.validate()?;

        let c = &self.cycle;
        if !(CYCLE_TIME_US_MIN..=CYCLE_TIME_US_MAX).contains(&c.period_us) {
            return Err(ConfigError::ValidationError(format!(
                "cycle.period_us {} out of range [{CYCLE_TIME_US_MIN}, {CYCLE_TIME_US_MAX}]",
                c.period_us
            )));
        }
        if !(c.deadman_timeout_s.is_finite() && c.deadman_timeout_s > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "cycle.deadman_timeout_s must be positive, got {}",
                c.deadman_timeout_s
            )));
        }
        if c.mirror_period_ms == 0 {
            return Err(ConfigError::ValidationError(
                "cycle.mirror_period_ms must be at least 1".to_string(),
            ));
        }

        let f = &self.filters;
        for (name, alpha) in [
            ("current_alpha", f.current_alpha),
            ("temperature_alpha", f.temperature_alpha),
            ("voltage_alpha", f.voltage_alpha),
        ] {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(ConfigError::ValidationError(format!(
                    "filters.{name} {alpha} out of range (0, 1]"
                )));
            }
        }

        if self.simulation.sensor_offsets_c.len() < self.hardware.temp_sensor_count {
            return Err(ConfigError::ValidationError(format!(
                "simulation models {} temperature sensors, hardware expects {}",
                self.simulation.sensor_offsets_c.len(),
                self.hardware.temp_sensor_count
            )));
        }

        let defaults = self.defaults.config(&self.hardware);
        defaults
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("defaults: {e}")))?;
        Ok(())
    }
}

/// Load and validate the unit configuration.
pub fn load_config(path: &Path) -> Result<UnitConfig, ConfigError> {
    let config = UnitConfig::load(path)?;
    config.validate()?;
    Ok(config)
}
