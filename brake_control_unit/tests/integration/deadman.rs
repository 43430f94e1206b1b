//! Integration test: dead-man timeout.
//!
//! A duty left without a fresh request for longer than the window is forced
//! to zero on the next iteration; refreshed duty survives indefinitely.

use std::time::Duration;

use brake_common::hal::driver::Indicator;

use super::fixtures::{Bench, unfiltered_config};

#[test]
fn stale_duty_is_forced_off_after_window() {
    let mut bench = Bench::new(&unfiltered_config());
    bench.unit.authority.request_duty(0.6);

    bench.clock.advance_ms(1_900);
    bench.tick();
    assert_eq!(bench.pwm(), 0.6);

    bench.clock.advance_ms(100);
    bench.tick();
    assert_eq!(bench.pwm(), 0.0);
    assert_eq!(bench.output.compare_ticks(), 0);
    assert!(!bench.output.indicator(Indicator::Active));
    assert_eq!(bench.unit.runner.stats.deadman_trips, 1);
}

#[test]
fn refreshed_duty_survives() {
    let mut bench = Bench::new(&unfiltered_config());

    for _ in 0..10 {
        bench.unit.authority.request_duty(0.4);
        bench.clock.advance_ms(1_000);
        bench.tick();
        assert_eq!(bench.pwm(), 0.4);
    }
    assert_eq!(bench.unit.runner.stats.deadman_trips, 0);
}

#[test]
fn idle_output_does_not_count_trips() {
    let mut bench = Bench::new(&unfiltered_config());

    bench.clock.advance_ms(5_000);
    bench.ticks(3);
    bench.clock.advance_ms(5_000);
    bench.tick();

    assert_eq!(bench.pwm(), 0.0);
    assert_eq!(bench.unit.runner.stats.deadman_trips, 0);
}

#[test]
fn repeated_request_only_restamps() {
    let bench = Bench::new(&unfiltered_config());

    bench.unit.authority.request_duty(0.25);
    let first = bench.unit.state.last_command_us();

    bench.clock.advance_ms(10);
    bench.unit.authority.request_duty(0.25);

    assert_eq!(bench.pwm(), 0.25);
    assert_eq!(bench.unit.state.last_command_us(), first + 10_000);
}

#[test]
fn timed_request_ends_at_zero() {
    let bench = Bench::new(&unfiltered_config());
    let mut ticks = 0;

    bench.unit.authority.hold_duty(
        0.3,
        Duration::from_millis(20),
        Duration::from_millis(5),
        |_| ticks += 1,
    );

    assert_eq!(ticks, 4);
    assert_eq!(bench.pwm(), 0.0);
}
