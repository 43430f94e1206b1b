//! Cycle benchmark: one control iteration over the simulated power stage.
//!
//! The plant is not stepped inside the measured loop, so only filtering,
//! limit evaluation, enforcement and the actuator write are timed.

use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use brake_common::clock::MonotonicClock;
use brake_common::control::config::FactoryDefaults;
use brake_common::control::retained::RetainedRecord;
use brake_control_unit::config::UnitConfig;
use brake_control_unit::persist::recovery::recover;
use brake_control_unit::unit::{Backends, ControlUnit};
use brake_hal::{BufferSink, MemoryStorage, SimulationDriver};

/// Operating points: (name, ambient °C, regen current A, shed fraction).
const SCENARIOS: &[(&str, f32, f32, f32)] = &[
    ("idle", 25.0, 0.0, 0.0),
    ("limiting", 70.0, 0.0, 0.0),
    ("shedding", 25.0, 40.0, 0.5),
];

fn unit_for(ambient: f32, regen: f32, fraction: f32) -> ControlUnit {
    let mut config = UnitConfig::default();
    config.cycle.report_interval_cycles = 0;
    config.defaults.load_volt_max_fraction = fraction;

    let plant = Arc::new(SimulationDriver::new(config.simulation.clone()));
    plant.set_ambient(ambient);
    // Several thermal time constants.
    for _ in 0..20_000 {
        plant.step(Duration::from_millis(10));
    }
    // Unloaded, regen charges the bus by ~4 V/ms; stop near the shed band.
    plant.set_regen_current(regen);
    for _ in 0..3 {
        plant.step(Duration::from_millis(1));
    }

    let storage = Arc::new(MemoryStorage::new());
    ControlUnit::assemble(
        &config,
        Backends {
            telemetry: plant.clone(),
            pwm: plant,
            clock: Arc::new(MonotonicClock::new()),
            retained: storage.clone(),
            nv: storage,
            sink: Arc::new(BufferSink::new()),
        },
    )
    .expect("unit assembles")
}

fn bench_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle_step");
    group.significance_level(0.01);
    group.sample_size(500);

    for &(name, ambient, regen, fraction) in SCENARIOS {
        let mut unit = unit_for(ambient, regen, fraction);
        // Let the filters converge.
        for _ in 0..1_000 {
            unit.runner.step();
        }

        group.bench_with_input(BenchmarkId::new("scenario", name), &name, |b, _| {
            b.iter(|| {
                unit.authority.request_duty(black_box(0.3));
                unit.runner.step();
            });
        });
    }

    group.finish();
}

fn bench_recovery(c: &mut Criterion) {
    let hw = UnitConfig::default().hardware;
    let defaults = FactoryDefaults::default();
    let nv = MemoryStorage::new();

    c.bench_function("recover_blank_record", |b| {
        b.iter(|| recover(black_box(Some(RetainedRecord::blank())), &nv, &defaults, &hw));
    });
}

criterion_group!(benches, bench_cycle, bench_recovery);
criterion_main!(benches);
