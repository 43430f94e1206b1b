//! Integration test: terminal commands and status output.

use std::time::Duration;

use brake_control_unit::command::terminal::Terminal;

use super::fixtures::{Bench, unfiltered_config};

fn terminal(bench: &Bench) -> Terminal {
    bench.unit.terminal(bench.sink.clone())
}

#[test]
fn res_pwm_sets_duty() {
    let bench = Bench::new(&unfiltered_config());
    terminal(&bench).execute("res_pwm 500");

    assert_eq!(bench.sink.take(), ["ok"]);
    assert_eq!(bench.pwm(), 0.5);
}

#[test]
fn res_pwm_rejects_bad_arguments() {
    let bench = Bench::new(&unfiltered_config());
    let term = terminal(&bench);
    bench.unit.authority.request_duty(0.1);

    term.execute("res_pwm 1001");
    term.execute("res_pwm -1");
    term.execute("res_pwm half");
    term.execute("res_pwm");
    term.execute("res_pwm 1 2");

    assert_eq!(
        bench.sink.take(),
        [
            "Invalid argument",
            "Invalid argument",
            "Invalid argument",
            "This command requires one argument.",
            "This command requires one argument.",
        ]
    );
    assert_eq!(bench.pwm(), 0.1);
}

#[test]
fn unknown_and_empty_lines() {
    let bench = Bench::new(&unfiltered_config());
    let term = terminal(&bench);

    term.execute("");
    term.execute("   ");
    term.execute("reboot now");

    assert_eq!(bench.sink.take(), ["Invalid command: reboot"]);
}

#[test]
fn status_and_help() {
    let mut bench = Bench::new(&unfiltered_config());
    bench.tick();
    let term = terminal(&bench);

    term.execute("status");
    let lines = bench.sink.take();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("id "), "{}", lines[0]);
    assert!(lines[0].contains("V 48.00"), "{}", lines[0]);

    term.execute("help");
    let lines = bench.sink.take();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("res_pwm [0 to 1000]"));
}

#[test]
fn timed_duty_prints_telemetry_and_ends_off() {
    let bench = Bench::new(&unfiltered_config());
    let term = terminal(&bench).with_timing(Duration::from_millis(10), Duration::from_millis(5));

    term.execute("res_pwm_to 300");

    let lines = bench.sink.take();
    assert_eq!(lines.first().map(String::as_str), Some("ON"));
    assert_eq!(lines.last().map(String::as_str), Some("OFF"));
    // Two refreshes of seven lines each.
    assert_eq!(lines.len(), 2 + 2 * 7);
    assert_eq!(lines[2], "V In     : 48.00");
    assert_eq!(lines[4], "T Center : 25.00");
    assert_eq!(lines[7], " ");
    assert_eq!(bench.pwm(), 0.0);
}

#[test]
fn periodic_report_reaches_sink() {
    let mut config = unfiltered_config();
    config.cycle.report_interval_cycles = 5;
    let mut bench = Bench::new(&config);

    bench.ticks(4);
    assert!(bench.sink.lines().is_empty());

    bench.ticks(6);
    let lines = bench.sink.take();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("pwm 0.000 max 1.000"), "{}", lines[0]);
}
