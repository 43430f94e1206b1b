//! Limit curves.
//!
//! A limit curve maps a filtered signal to an allowance in [0, 1] with three
//! zones: full allowance on the `start` side, a linear ramp between
//! `start` and `end`, and the end allowance beyond `end`. The same law
//! serves the thermal limit (1 → 0 as temperature rises), the low-voltage
//! limit (1 → 0 as voltage falls) and the load-shedding target
//! (0 → fraction as voltage rises).

use bitflags::bitflags;
use brake_common::control::config::ResistorConfig;

/// Three-zone piecewise-linear evaluation.
///
/// Works for either orientation of `start` and `end`. Inside the ramp the
/// result is `a + (value - start) / (end - start) * (b - a)`.
///
/// With `start == end` the curve is a step. A value that cannot be placed
/// (NaN, or exactly on a degenerate step) yields `min(a, b)`.
#[inline]
pub fn evaluate(value: f32, start: f32, end: f32, allow_at_start: f32, allow_at_end: f32) -> f32 {
    let t = (value - start) / (end - start);
    if t.is_nan() {
        allow_at_start.min(allow_at_end)
    } else if t <= 0.0 {
        allow_at_start
    } else if t >= 1.0 {
        allow_at_end
    } else {
        allow_at_start + (value - start) / (end - start) * (allow_at_end - allow_at_start)
    }
}

/// Conservative combination of independent allowances.
#[inline]
pub fn combine(temperature_allow: f32, voltage_allow: f32) -> f32 {
    temperature_allow.min(voltage_allow)
}

bitflags! {
    /// Threshold pairs that violated their ordering and were collapsed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Misordered: u8 {
        const TEMPERATURE   = 0x01;
        const VOLTAGE_LOWER = 0x02;
        const AUTO_LOAD     = 0x04;
    }
}

/// One curve: thresholds plus endpoint allowances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Curve {
    pub start: f32,
    pub end: f32,
    pub allow_at_start: f32,
    pub allow_at_end: f32,
}

impl Curve {
    #[inline]
    pub fn allow(&self, value: f32) -> f32 {
        evaluate(value, self.start, self.end, self.allow_at_start, self.allow_at_end)
    }
}

/// Curves derived from one configuration.
///
/// A misordered pair is collapsed to a step at its conservative threshold:
/// the lower temperature, the higher low-voltage limit and the higher
/// load-shedding start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitSet {
    pub temperature: Curve,
    pub voltage_lower: Curve,
    /// Lowest voltage at which load shedding may act.
    pub load_start: f32,
    pub load: Curve,
    pub misordered: Misordered,
}

impl LimitSet {
    pub fn from_config(cfg: &ResistorConfig) -> Self {
        let mut misordered = Misordered::empty();

        let temperature = if cfg.temp_lim_start < cfg.temp_lim_end {
            Curve {
                start: cfg.temp_lim_start,
                end: cfg.temp_lim_end,
                allow_at_start: 1.0,
                allow_at_end: 0.0,
            }
        } else {
            misordered |= Misordered::TEMPERATURE;
            let at = cfg.temp_lim_start.min(cfg.temp_lim_end);
            Curve {
                start: at,
                end: at,
                allow_at_start: 1.0,
                allow_at_end: 0.0,
            }
        };

        let voltage_lower = if cfg.volt_lower_lim_start > cfg.volt_lower_lim_end {
            Curve {
                start: cfg.volt_lower_lim_start,
                end: cfg.volt_lower_lim_end,
                allow_at_start: 1.0,
                allow_at_end: 0.0,
            }
        } else {
            misordered |= Misordered::VOLTAGE_LOWER;
            // Written rising so the step denies below the threshold.
            let at = cfg.volt_lower_lim_start.max(cfg.volt_lower_lim_end);
            Curve {
                start: at,
                end: at,
                allow_at_start: 0.0,
                allow_at_end: 1.0,
            }
        };

        let (load_start, load_max) = if cfg.load_volt_start < cfg.load_volt_max {
            (cfg.load_volt_start, cfg.load_volt_max)
        } else {
            misordered |= Misordered::AUTO_LOAD;
            let at = cfg.load_volt_start.max(cfg.load_volt_max);
            (at, at)
        };
        let fraction = if cfg.load_volt_max_fraction.is_nan() {
            0.0
        } else {
            cfg.load_volt_max_fraction.clamp(0.0, 1.0)
        };

        Self {
            temperature,
            voltage_lower,
            load_start,
            load: Curve {
                start: load_start,
                end: load_max,
                allow_at_start: 0.0,
                allow_at_end: fraction,
            },
            misordered,
        }
    }

    /// Thermal allowance at the filtered maximum temperature.
    #[inline]
    pub fn temperature_allow(&self, temp_max: f32) -> f32 {
        self.temperature.allow(temp_max)
    }

    /// Low-voltage allowance at the filtered bus voltage.
    #[inline]
    pub fn voltage_allow(&self, voltage: f32) -> f32 {
        self.voltage_lower.allow(voltage)
    }
}
