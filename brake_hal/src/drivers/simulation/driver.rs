//! Simulation driver implementation.
//!
//! `SimulationDriver` implements `TelemetrySource` and `PwmOutput` over a
//! [`PowerStage`]. The compare register and the sampled values are atomics,
//! so the control task and the command path never wait on the plant lock;
//! only [`SimulationDriver::step`] touches the plant.

use brake_common::hal::config::PwmTiming;
use brake_common::hal::driver::{HalError, Indicator, PwmOutput, TelemetrySource};
use brake_common::sync::AtomicF32;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

use super::physics::{PlantParams, PowerStage};

/// Simulated timer, indicators and analog front end.
pub struct SimulationDriver {
    plant: Mutex<PowerStage>,
    /// Auto-reload value; 0 until `configure` runs.
    period_ticks: AtomicU32,
    compare_ticks: AtomicU32,
    indicators: [AtomicBool; 2],
    bus_voltage: AtomicF32,
    input_current: AtomicF32,
    temperatures: Vec<AtomicF32>,
}

impl SimulationDriver {
    /// Create a driver with the plant at rest.
    pub fn new(params: PlantParams) -> Self {
        let plant = PowerStage::new(params);
        let temperatures = (0..plant.sensor_count())
            .map(|i| AtomicF32::new(plant.sensor_temperature(i).unwrap_or(f32::NAN)))
            .collect();
        Self {
            bus_voltage: AtomicF32::new(plant.bus_voltage()),
            input_current: AtomicF32::new(plant.input_current()),
            temperatures,
            plant: Mutex::new(plant),
            period_ticks: AtomicU32::new(0),
            compare_ticks: AtomicU32::new(0),
            indicators: [AtomicBool::new(false), AtomicBool::new(false)],
        }
    }

    /// Duty currently latched in the timer.
    pub fn duty(&self) -> f32 {
        let period = self.period_ticks.load(Ordering::Relaxed);
        if period == 0 {
            return 0.0;
        }
        let compare = self.compare_ticks.load(Ordering::Relaxed).min(period);
        compare as f32 / period as f32
    }

    pub fn compare_ticks(&self) -> u32 {
        self.compare_ticks.load(Ordering::Relaxed)
    }

    pub fn indicator(&self, indicator: Indicator) -> bool {
        self.indicators[indicator as usize].load(Ordering::Relaxed)
    }

    /// Inject regenerative current onto the bus [A].
    pub fn set_regen_current(&self, amps: f32) {
        self.lock_plant().set_regen_current(amps);
        debug!(amps, "regen current set");
    }

    pub fn set_ambient(&self, celsius: f32) {
        self.lock_plant().set_ambient(celsius);
    }

    /// Advance the plant by `dt` at the latched duty and publish new samples.
    pub fn step(&self, dt: Duration) {
        let duty = self.duty();
        let mut plant = self.lock_plant();
        plant.step(duty, dt);
        self.bus_voltage.store(plant.bus_voltage());
        self.input_current.store(plant.input_current());
        for (i, cell) in self.temperatures.iter().enumerate() {
            if let Some(t) = plant.sensor_temperature(i) {
                cell.store(t);
            }
        }
    }

    fn lock_plant(&self) -> std::sync::MutexGuard<'_, PowerStage> {
        self.plant.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new(PlantParams::default())
    }
}

impl TelemetrySource for SimulationDriver {
    /// Unknown sensors read NaN, which the thermal maximum ignores.
    fn read_temperature(&self, sensor_index: usize) -> f32 {
        self.temperatures
            .get(sensor_index)
            .map_or(f32::NAN, AtomicF32::load)
    }

    fn read_bus_voltage(&self) -> f32 {
        self.bus_voltage.load()
    }

    fn read_input_current(&self) -> f32 {
        self.input_current.load()
    }
}

impl PwmOutput for SimulationDriver {
    fn configure(&self, timing: PwmTiming) -> Result<(), HalError> {
        if timing.period_ticks == 0 {
            return Err(HalError::ConfigError(
                "timer period must be at least one tick".to_string(),
            ));
        }
        if timing.deadtime_ticks >= timing.period_ticks {
            return Err(HalError::ConfigError(format!(
                "dead time {} ticks does not fit in period {} ticks",
                timing.deadtime_ticks, timing.period_ticks
            )));
        }
        self.compare_ticks.store(0, Ordering::Relaxed);
        self.period_ticks.store(timing.period_ticks, Ordering::Relaxed);
        info!(
            period_ticks = timing.period_ticks,
            deadtime_ticks = timing.deadtime_ticks,
            "simulated timer configured"
        );
        Ok(())
    }

    fn set_compare(&self, ticks: u32) {
        self.compare_ticks.store(ticks, Ordering::Relaxed);
    }

    fn set_indicator(&self, indicator: Indicator, on: bool) {
        self.indicators[indicator as usize].store(on, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> PwmTiming {
        PwmTiming {
            period_ticks: 532,
            deadtime_ticks: 24,
        }
    }

    #[test]
    fn duty_follows_compare() {
        let drv = SimulationDriver::default();
        assert_eq!(drv.duty(), 0.0);
        drv.configure(timing()).unwrap();
        drv.set_compare(266);
        assert!((drv.duty() - 0.5).abs() < 1e-6);
        drv.set_compare(10_000);
        assert_eq!(drv.duty(), 1.0);
    }

    #[test]
    fn configure_rejects_bad_timing() {
        let drv = SimulationDriver::default();
        let err = drv
            .configure(PwmTiming {
                period_ticks: 0,
                deadtime_ticks: 0,
            })
            .unwrap_err();
        assert!(matches!(err, HalError::ConfigError(_)));
        assert!(drv
            .configure(PwmTiming {
                period_ticks: 10,
                deadtime_ticks: 10,
            })
            .is_err());
    }

    #[test]
    fn indicators_latch() {
        let drv = SimulationDriver::default();
        drv.set_indicator(Indicator::Active, true);
        assert!(drv.indicator(Indicator::Active));
        assert!(!drv.indicator(Indicator::Limiting));
    }

    #[test]
    fn step_publishes_samples() {
        let drv = SimulationDriver::default();
        drv.configure(timing()).unwrap();
        drv.set_compare(532);
        for _ in 0..100 {
            drv.step(Duration::from_millis(1));
        }
        assert!(drv.read_input_current() > 0.0);
        assert!(drv.read_bus_voltage() < 48.0);
        assert!(drv.read_temperature(0) > 25.0);
        assert!(drv.read_temperature(7).is_nan());
    }
}
