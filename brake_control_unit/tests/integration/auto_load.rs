//! Integration test: automatic load shedding.
//!
//! Bus over-voltage is answered with resistor duty independently of the
//! command authority, and still bounded by the combined ceiling.

use super::fixtures::{Bench, unfiltered_config};

fn shedding_bench(fraction: f32) -> Bench {
    let bench = Bench::new(&unfiltered_config());
    bench.set_limits(|cfg| {
        cfg.load_volt_start = 28.0;
        cfg.load_volt_max = 33.0;
        cfg.load_volt_max_fraction = fraction;
    });
    bench
}

#[test]
fn over_voltage_sheds_proportionally() {
    let mut bench = shedding_bench(0.5);
    bench.telemetry.set_voltage(30.0);
    bench.tick();

    assert!((bench.pwm() - 0.2).abs() < 1e-5, "pwm {}", bench.pwm());
}

#[test]
fn beyond_max_voltage_holds_fraction() {
    let mut bench = shedding_bench(0.5);
    bench.telemetry.set_voltage(40.0);
    bench.tick();

    assert!((bench.pwm() - 0.5).abs() < 1e-6);
}

#[test]
fn below_start_leaves_command_alone() {
    let mut bench = shedding_bench(0.5);
    bench.telemetry.set_voltage(27.0);
    bench.unit.authority.request_duty(0.6);
    bench.tick();

    assert_eq!(bench.pwm(), 0.6);
}

#[test]
fn small_fraction_disables_policy() {
    let mut bench = shedding_bench(0.02);
    bench.telemetry.set_voltage(40.0);
    bench.tick();

    assert_eq!(bench.pwm(), 0.0);
}

#[test]
fn latest_writer_wins() {
    let mut bench = shedding_bench(0.5);
    bench.telemetry.set_voltage(30.0);
    bench.tick();

    bench.unit.authority.request_duty(0.6);
    assert_eq!(bench.pwm(), 0.6);

    bench.tick();
    assert!((bench.pwm() - 0.2).abs() < 1e-5);
}

#[test]
fn shedding_respects_thermal_ceiling() {
    let mut bench = shedding_bench(0.9);
    bench.set_limits(|cfg| {
        cfg.temp_lim_start = 50.0;
        cfg.temp_lim_end = 80.0;
    });
    bench.telemetry.set_temperatures([65.0, 30.0, 30.0]);
    bench.telemetry.set_voltage(40.0);
    bench.tick();

    assert!((bench.pwm() - 0.5).abs() < 1e-6);
}

#[test]
fn shedding_keeps_deadman_armed() {
    let mut bench = shedding_bench(0.5);
    bench.telemetry.set_voltage(40.0);

    for _ in 0..5 {
        bench.clock.advance_ms(1_000);
        bench.tick();
        assert!((bench.pwm() - 0.5).abs() < 1e-6);
    }
    assert_eq!(bench.unit.runner.stats.deadman_trips, 0);
}
