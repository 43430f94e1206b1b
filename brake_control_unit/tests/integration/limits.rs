//! Integration test: limit curves through the running cycle.
//!
//! Scripted temperature and voltage drive the allowances published in the
//! controller state, the ceiling applied to commanded duty and the
//! limiting indicator.

use brake_common::hal::driver::Indicator;

use super::fixtures::{Bench, unfiltered_config};

fn thermal_bench() -> Bench {
    let bench = Bench::new(&unfiltered_config());
    bench.set_limits(|cfg| {
        cfg.temp_lim_start = 50.0;
        cfg.temp_lim_end = 80.0;
    });
    bench
}

#[test]
fn temperature_allowance_follows_curve() {
    let mut bench = thermal_bench();

    for (temp, expected) in [(40.0, 1.0), (65.0, 0.5), (90.0, 0.0)] {
        bench.telemetry.set_temperatures([temp, 30.0, 30.0]);
        bench.tick();
        let allow = bench.unit.state.temperature_allow();
        assert!(
            (allow - expected).abs() < 1e-6,
            "at {temp} °C allowance {allow}, expected {expected}"
        );
    }
}

#[test]
fn hottest_sensor_governs() {
    let mut bench = thermal_bench();
    bench.telemetry.set_temperatures([30.0, 65.0, 20.0]);
    bench.tick();

    assert!((bench.unit.state.filtered_temp_max() - 65.0).abs() < 1e-6);
    assert!((bench.unit.state.temperature_allow() - 0.5).abs() < 1e-6);
}

#[test]
fn commanded_duty_is_cut_to_ceiling() {
    let mut bench = thermal_bench();
    bench.tick();
    assert_eq!(bench.unit.authority.request_duty(0.8), 0.8);

    bench.telemetry.set_temperatures([65.0, 30.0, 30.0]);
    bench.tick();

    assert!((bench.pwm() - 0.5).abs() < 1e-6);
    assert!((bench.output.duty() - 0.5).abs() < 1e-3);
    assert!(bench.output.indicator(Indicator::Limiting));
    assert!(bench.output.indicator(Indicator::Active));
}

#[test]
fn requests_above_ceiling_are_clamped() {
    let mut bench = thermal_bench();
    bench.telemetry.set_temperatures([65.0, 30.0, 30.0]);
    bench.tick();

    for requested in [-1.0, 0.3, 0.9, 5.0, f32::NAN] {
        let applied = bench.unit.authority.request_duty(requested);
        let max = bench.unit.state.pwm_allowed_max();
        assert!((0.0..=max).contains(&applied), "{requested} -> {applied}");
        assert_eq!(applied, bench.pwm());
    }
}

#[test]
fn low_bus_voltage_limits_output() {
    let mut bench = Bench::new(&unfiltered_config());
    bench.set_limits(|cfg| {
        cfg.volt_lower_lim_start = 24.0;
        cfg.volt_lower_lim_end = 20.0;
    });
    bench.unit.authority.request_duty(1.0);

    bench.telemetry.set_voltage(22.0);
    bench.tick();

    assert!((bench.unit.state.voltage_allow() - 0.5).abs() < 1e-6);
    assert!((bench.unit.state.pwm_allowed_max() - 0.5).abs() < 1e-6);
    assert!((bench.pwm() - 0.5).abs() < 1e-6);
    // Voltage alone does not light the thermal indicator.
    assert!(!bench.output.indicator(Indicator::Limiting));
}

#[test]
fn combined_ceiling_is_the_smaller_allowance() {
    let mut bench = thermal_bench();
    bench.set_limits(|cfg| {
        cfg.volt_lower_lim_start = 24.0;
        cfg.volt_lower_lim_end = 20.0;
    });

    bench.telemetry.set_temperatures([56.0, 25.0, 25.0]);
    bench.telemetry.set_voltage(21.0);
    bench.tick();

    let s = bench.unit.state.snapshot();
    assert!((s.temperature_allow - 0.8).abs() < 1e-5);
    assert!((s.voltage_allow - 0.25).abs() < 1e-5);
    assert_eq!(s.pwm_allowed_max, s.temperature_allow.min(s.voltage_allow));
}

#[test]
fn cooling_reopens_ceiling_without_raising_duty() {
    let mut bench = thermal_bench();
    bench.unit.authority.request_duty(0.8);
    bench.telemetry.set_temperatures([75.0, 30.0, 30.0]);
    bench.tick();
    let cut = bench.pwm();
    assert!(cut < 0.2);

    bench.telemetry.set_temperatures([30.0, 30.0, 30.0]);
    bench.tick();

    assert_eq!(bench.unit.state.pwm_allowed_max(), 1.0);
    assert_eq!(bench.pwm(), cut);
    assert!(!bench.output.indicator(Indicator::Limiting));
}
