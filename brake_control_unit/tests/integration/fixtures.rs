//! Shared test bench: a unit over scripted telemetry, a simulated output
//! stage used as a recorder, a manual clock and in-memory storage.

#![allow(dead_code)]

use std::sync::Arc;

use brake_common::clock::ManualClock;
use brake_common::control::config::ResistorConfig;
use brake_common::hal::driver::{NvStorage, RetainedMemory, TelemetrySource};
use brake_common::sync::AtomicF32;
use brake_control_unit::config::{FilterConfig, UnitConfig};
use brake_control_unit::unit::{Backends, ControlUnit};
use brake_hal::{BufferSink, MemoryStorage, SimulationDriver};

/// Telemetry whose readings are set by the test.
pub struct ScriptedTelemetry {
    temperatures: [AtomicF32; 3],
    voltage: AtomicF32,
    current: AtomicF32,
}

impl ScriptedTelemetry {
    pub fn new() -> Self {
        Self {
            temperatures: [
                AtomicF32::new(25.0),
                AtomicF32::new(25.0),
                AtomicF32::new(25.0),
            ],
            voltage: AtomicF32::new(48.0),
            current: AtomicF32::new(0.0),
        }
    }

    pub fn set_temperatures(&self, celsius: [f32; 3]) {
        for (cell, t) in self.temperatures.iter().zip(celsius) {
            cell.store(t);
        }
    }

    pub fn set_voltage(&self, volts: f32) {
        self.voltage.store(volts);
    }

    pub fn set_current(&self, amps: f32) {
        self.current.store(amps);
    }
}

impl TelemetrySource for ScriptedTelemetry {
    fn read_temperature(&self, sensor_index: usize) -> f32 {
        self.temperatures
            .get(sensor_index)
            .map_or(f32::NAN, AtomicF32::load)
    }

    fn read_bus_voltage(&self) -> f32 {
        self.voltage.load()
    }

    fn read_input_current(&self) -> f32 {
        self.current.load()
    }
}

/// Unit config whose filters pass samples straight through.
pub fn unfiltered_config() -> UnitConfig {
    UnitConfig {
        filters: FilterConfig {
            current_alpha: 1.0,
            temperature_alpha: 1.0,
            voltage_alpha: 1.0,
        },
        ..UnitConfig::default()
    }
}

pub struct Bench {
    pub unit: ControlUnit,
    pub telemetry: Arc<ScriptedTelemetry>,
    pub output: Arc<SimulationDriver>,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<BufferSink>,
}

impl Bench {
    /// Bench over blank in-memory storage.
    pub fn new(config: &UnitConfig) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        Self::with_storage(config, storage.clone(), storage)
    }

    pub fn with_storage(
        config: &UnitConfig,
        retained: Arc<dyn RetainedMemory>,
        nv: Arc<dyn NvStorage>,
    ) -> Self {
        let telemetry = Arc::new(ScriptedTelemetry::new());
        let output = Arc::new(SimulationDriver::default());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let sink = Arc::new(BufferSink::new());
        let unit = ControlUnit::assemble(
            config,
            Backends {
                telemetry: telemetry.clone(),
                pwm: output.clone(),
                clock: clock.clone(),
                retained,
                nv,
                sink: sink.clone(),
            },
        )
        .expect("unit assembles");
        Self {
            unit,
            telemetry,
            output,
            clock,
            sink,
        }
    }

    /// Replace the live limits, keeping identity fields.
    pub fn set_limits(&self, edit: impl FnOnce(&mut ResistorConfig)) {
        let mut cfg = self.unit.authority.config();
        edit(&mut cfg);
        self.unit
            .authority
            .set_config(cfg)
            .expect("limits accepted");
    }

    /// Advance the clock by one period and run one iteration.
    pub fn tick(&mut self) {
        let period = self.unit.runner.period();
        self.clock.advance_us(period.as_micros() as u64);
        self.unit.runner.step();
    }

    pub fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    pub fn pwm(&self) -> f32 {
        self.unit.state.pwm_current()
    }
}
