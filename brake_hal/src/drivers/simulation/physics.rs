//! Power stage physics.
//!
//! Lumped model of the bus and the resistor:
//! - DC bus: capacitance fed by a supply through its source resistance plus
//!   an injected regenerative current, discharged by the resistor.
//! - Resistor: `P = V² / R · duty`.
//! - Heat sink: first-order thermal mass with cooling to ambient. Each
//!   temperature sensor reads the sink temperature plus a fixed offset.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Integration step upper bound [s].
const MAX_SUBSTEP_S: f64 = 0.000_25;

/// Plant parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlantParams {
    /// Supply open-circuit voltage [V].
    pub supply_voltage: f32,
    /// Supply source resistance [Ω].
    pub supply_resistance_ohm: f32,
    /// Bus capacitance [F].
    pub bus_capacitance_f: f32,
    /// Braking resistor [Ω].
    pub load_resistance_ohm: f32,
    /// Heat capacity of resistor and sink [J/K].
    pub thermal_mass_j_per_k: f32,
    /// Sink to ambient thermal resistance [K/W].
    pub thermal_resistance_k_per_w: f32,
    /// Ambient temperature [°C].
    pub ambient_c: f32,
    /// Per-sensor reading offset from the sink temperature [°C].
    pub sensor_offsets_c: Vec<f32>,
}

impl Default for PlantParams {
    fn default() -> Self {
        Self {
            supply_voltage: 48.0,
            supply_resistance_ohm: 0.5,
            bus_capacitance_f: 0.01,
            load_resistance_ohm: 2.0,
            thermal_mass_j_per_k: 150.0,
            thermal_resistance_k_per_w: 0.4,
            ambient_c: 25.0,
            sensor_offsets_c: vec![0.0, -2.0, -5.0],
        }
    }
}

/// Simulated power stage state.
#[derive(Debug, Clone)]
pub struct PowerStage {
    params: PlantParams,
    bus_voltage: f64,
    sink_temperature: f64,
    load_current: f64,
    regen_current: f64,
}

impl PowerStage {
    /// Start in steady state: bus at supply voltage, sink at ambient.
    pub fn new(params: PlantParams) -> Self {
        Self {
            bus_voltage: f64::from(params.supply_voltage),
            sink_temperature: f64::from(params.ambient_c),
            load_current: 0.0,
            regen_current: 0.0,
            params,
        }
    }

    /// Current pushed onto the bus by a braking drive [A].
    pub fn set_regen_current(&mut self, amps: f32) {
        self.regen_current = f64::from(amps.max(0.0));
    }

    pub fn set_ambient(&mut self, celsius: f32) {
        self.params.ambient_c = celsius;
    }

    /// Advance the model by `dt` with the resistor switched at `duty`.
    pub fn step(&mut self, duty: f32, dt: Duration) {
        let duty = f64::from(duty.clamp(0.0, 1.0));
        let total = dt.as_secs_f64();
        if total <= 0.0 {
            return;
        }
        let substeps = (total / MAX_SUBSTEP_S).ceil().max(1.0);
        let h = total / substeps;

        let p = &self.params;
        let r_src = f64::from(p.supply_resistance_ohm).max(1e-3);
        let r_load = f64::from(p.load_resistance_ohm).max(1e-3);
        let cap = f64::from(p.bus_capacitance_f).max(1e-6);
        let mass = f64::from(p.thermal_mass_j_per_k).max(1e-3);
        let r_th = f64::from(p.thermal_resistance_k_per_w).max(1e-3);
        let v_src = f64::from(p.supply_voltage);
        let ambient = f64::from(p.ambient_c);

        for _ in 0..substeps as u32 {
            let v = self.bus_voltage;
            let i_supply = ((v_src - v) / r_src).max(0.0);
            let i_load = v / r_load * duty;
            let dv = (i_supply + self.regen_current - i_load) / cap;
            self.bus_voltage = (v + dv * h).max(0.0);
            self.load_current = i_load;

            let power = v * v / r_load * duty;
            let cooling = (self.sink_temperature - ambient) / r_th;
            self.sink_temperature += (power - cooling) / mass * h;
        }
    }

    #[inline]
    pub fn bus_voltage(&self) -> f32 {
        self.bus_voltage as f32
    }

    /// Current drawn by the resistor [A].
    #[inline]
    pub fn input_current(&self) -> f32 {
        self.load_current as f32
    }

    /// Reading of sensor `index`, `None` past the configured sensor count.
    pub fn sensor_temperature(&self, index: usize) -> Option<f32> {
        self.params
            .sensor_offsets_c
            .get(index)
            .map(|offset| (self.sink_temperature + f64::from(*offset)) as f32)
    }

    pub fn sensor_count(&self) -> usize {
        self.params.sensor_offsets_c.len()
    }
}
