//! Terminal commands.
//!
//! Line-oriented text commands for bench testing. Replies go to a
//! `StatusSink`.
//!
//! | Command              | Effect                                         |
//! |----------------------|------------------------------------------------|
//! | `res_pwm <0..1000>`  | Request duty in per-mille                      |
//! | `res_pwm_to <0..1000>` | Hold duty for 3 s while printing telemetry   |
//! | `status`             | Print a controller state snapshot              |
//! | `help`               | List commands                                  |

use std::sync::Arc;
use std::time::Duration;

use brake_common::hal::driver::{StatusSink, TelemetrySource};

use super::authority::{CommandAuthority, DUTY_REFRESH_INTERVAL};

/// How long `res_pwm_to` holds its duty.
pub const TIMED_DUTY_HOLD: Duration = Duration::from_secs(3);

const REPLY_OK: &str = "ok";
const REPLY_INVALID_ARGUMENT: &str = "Invalid argument";
const REPLY_ONE_ARGUMENT: &str = "This command requires one argument.";

const HELP: &[(&str, &str, &str)] = &[
    ("res_pwm", "Set resistor PWM", "[0 to 1000]"),
    ("res_pwm_to", "Set resistor PWM with timeout", "[0 to 1000]"),
    ("status", "Print controller state", ""),
    ("help", "Show this help", ""),
];

const SENSOR_LABELS: &[&str] = &["T Center", "T MOS", "T PCB"];

/// Text command interpreter.
pub struct Terminal {
    authority: Arc<CommandAuthority>,
    telemetry: Arc<dyn TelemetrySource>,
    sink: Arc<dyn StatusSink>,
    sensor_count: usize,
    hold: Duration,
    refresh: Duration,
}

impl Terminal {
    pub fn new(
        authority: Arc<CommandAuthority>,
        telemetry: Arc<dyn TelemetrySource>,
        sink: Arc<dyn StatusSink>,
        sensor_count: usize,
    ) -> Self {
        Self {
            authority,
            telemetry,
            sink,
            sensor_count,
            hold: TIMED_DUTY_HOLD,
            refresh: DUTY_REFRESH_INTERVAL,
        }
    }

    /// Override the `res_pwm_to` hold time and refresh interval.
    pub fn with_timing(mut self, hold: Duration, refresh: Duration) -> Self {
        self.hold = hold;
        self.refresh = refresh;
        self
    }

    /// Parse and run one command line.
    pub fn execute(&self, line: &str) {
        let args: Vec<&str> = line.split_whitespace().collect();
        let Some((&name, rest)) = args.split_first() else {
            return;
        };

        match name {
            "res_pwm" => {
                if let Some(duty) = self.per_mille_arg(rest) {
                    self.authority.request_duty(duty);
                    self.sink.report(REPLY_OK);
                }
            }
            "res_pwm_to" => {
                if let Some(duty) = self.per_mille_arg(rest) {
                    self.timed_duty(duty);
                }
            }
            "status" => self.print_status(),
            "help" => self.print_help(),
            other => self.sink.report(&format!("Invalid command: {other}")),
        }
    }

    /// Single argument in `0..=1000`, as a duty fraction.
    fn per_mille_arg(&self, rest: &[&str]) -> Option<f32> {
        let [arg] = rest else {
            self.sink.report(REPLY_ONE_ARGUMENT);
            return None;
        };
        match arg.parse::<i32>() {
            Ok(d) if (0..=1000).contains(&d) => Some(d as f32 / 1000.0),
            _ => {
                self.sink.report(REPLY_INVALID_ARGUMENT);
                None
            }
        }
    }

    fn timed_duty(&self, duty: f32) {
        self.sink.report("ON");
        self.authority
            .hold_duty(duty, self.hold, self.refresh, |remaining| {
                self.sink
                    .report(&format!("Time     : {:.0}", remaining.as_secs_f32()));
                self.sink.report(&format!(
                    "V In     : {:.2}",
                    self.telemetry.read_bus_voltage()
                ));
                self.sink.report(&format!(
                    "I In     : {:.2}",
                    self.authority.status().filtered_current
                ));
                for i in 0..self.sensor_count {
                    let t = self.telemetry.read_temperature(i);
                    match SENSOR_LABELS.get(i) {
                        Some(label) => self.sink.report(&format!("{label:<9}: {t:.2}")),
                        None => self.sink.report(&format!("T {i:<7}: {t:.2}")),
                    }
                }
                self.sink.report(" ");
            });
        self.sink.report("OFF");
    }

    fn print_status(&self) {
        let s = self.authority.status();
        let cfg = self.authority.config();
        self.sink.report(&format!(
            "id {} pwm {:.3} max {:.3} (temp {:.3} volt {:.3}) V {:.2} I {:.2} T {:.2}",
            cfg.controller_id,
            s.pwm_current,
            s.pwm_allowed_max,
            s.temperature_allow,
            s.voltage_allow,
            s.filtered_voltage,
            s.filtered_current,
            s.filtered_temp_max,
        ));
    }

    fn print_help(&self) {
        for (name, help, arg) in HELP {
            if arg.is_empty() {
                self.sink.report(&format!("{name}\n  {help}"));
            } else {
                self.sink.report(&format!("{name} {arg}\n  {help}"));
            }
        }
    }
}
