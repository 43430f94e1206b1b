//! Telemetry filters.
//!
//! First-order exponential low-pass per signal:
//! ```text
//! y[n] = y[n-1] + α · (x[n] - y[n-1])
//! ```
//! with a fixed per-iteration `α` for each of current, temperature and
//! voltage. Filters start at zero.

use crate::config::FilterConfig;

/// One low-pass step.
///
/// A non-finite sample leaves the filtered value unchanged.
#[inline]
pub fn lowpass_step(filtered: f32, sample: f32, alpha: f32) -> f32 {
    if !sample.is_finite() {
        return filtered;
    }
    filtered + alpha * (sample - filtered)
}

/// Raw samples of one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    /// Hottest temperature sensor [°C].
    pub temp_max: f32,
    /// Bus voltage [V].
    pub voltage: f32,
    /// Input current [A].
    pub current: f32,
}

/// Filtered telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FilteredTelemetry {
    pub temp_max: f32,
    pub voltage: f32,
    pub current: f32,
}

/// Low-pass filter bank over the three telemetry signals.
#[derive(Debug, Clone)]
pub struct TelemetryFilter {
    alphas: FilterConfig,
    value: FilteredTelemetry,
}

impl TelemetryFilter {
    pub fn new(alphas: FilterConfig) -> Self {
        Self {
            alphas,
            value: FilteredTelemetry::default(),
        }
    }

    /// Fold one sample into every filter and return the new values.
    pub fn update(&mut self, sample: TelemetrySample) -> FilteredTelemetry {
        let a = &self.alphas;
        self.value.temp_max = lowpass_step(self.value.temp_max, sample.temp_max, a.temperature_alpha);
        self.value.current = lowpass_step(self.value.current, sample.current, a.current_alpha);
        self.value.voltage = lowpass_step(self.value.voltage, sample.voltage, a.voltage_alpha);
        self.value
    }

    #[inline]
    pub fn value(&self) -> FilteredTelemetry {
        self.value
    }
}

/// Hottest of the given sensor readings. NaN readings are ignored.
pub fn max_temperature(readings: impl IntoIterator<Item = f32>) -> f32 {
    readings.into_iter().fold(f32::NEG_INFINITY, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_moves_alpha_of_the_way() {
        assert_eq!(lowpass_step(0.0, 10.0, 0.5), 5.0);
        assert_eq!(lowpass_step(5.0, 10.0, 0.5), 7.5);
        assert_eq!(lowpass_step(3.0, 3.0, 0.05), 3.0);
        assert_eq!(lowpass_step(2.0, 100.0, 1.0), 100.0);
    }

    #[test]
    fn non_finite_sample_holds() {
        assert_eq!(lowpass_step(4.0, f32::NAN, 0.5), 4.0);
        assert_eq!(lowpass_step(4.0, f32::INFINITY, 0.5), 4.0);
    }

    #[test]
    fn converges_to_constant_input() {
        let mut y = 0.0;
        for _ in 0..2000 {
            y = lowpass_step(y, 48.0, 0.01);
        }
        assert!((y - 48.0).abs() < 1e-3, "y = {y}");
    }

    #[test]
    fn bank_uses_per_signal_constants() {
        let mut f = TelemetryFilter::new(FilterConfig::default());
        let out = f.update(TelemetrySample {
            temp_max: 100.0,
            voltage: 100.0,
            current: 100.0,
        });
        assert!((out.temp_max - 5.0).abs() < 1e-5);
        assert!((out.voltage - 50.0).abs() < 1e-5);
        assert!((out.current - 1.0).abs() < 1e-5);
        assert_eq!(f.value(), out);
    }

    #[test]
    fn hottest_sensor_wins() {
        assert_eq!(max_temperature([31.0, 45.5, 40.0]), 45.5);
        assert_eq!(max_temperature([f32::NAN, 20.0]), 20.0);
        assert_eq!(max_temperature([]), f32::NEG_INFINITY);
    }
}
