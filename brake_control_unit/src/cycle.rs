//! Fixed-period control cycle.
//!
//! ## Iteration order
//! 1. Sample telemetry (hottest of all temperature sensors) and filter it.
//! 2. Evaluate the thermal and low-voltage limit curves; drive the
//!    limiting indicator from the thermal allowance.
//! 3. Combine both allowances into the duty ceiling.
//! 4. Enforce the ceiling on the running duty.
//! 5. Dead-man: force zero when no request was accepted within the window.
//! 6. Automatic load shedding: apply a positive target.
//!
//! An iteration never blocks. The loop sleeps for the rest of the period
//! between iterations.
//!
//! ## RT Setup
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)` - lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity` - pin to the configured CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, prio)` - RT priority.

use core::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use brake_common::consts::LIMIT_INDICATOR_THRESHOLD;
use brake_common::hal::driver::{StatusSink, TelemetrySource};
use tracing::{debug, info, warn};

use crate::config::UnitConfig;
use crate::control::auto_load;
use crate::control::filters::{TelemetryFilter, TelemetrySample, max_temperature};
use crate::control::limits::{LimitSet, Misordered, combine};
use crate::control::output::Actuator;
use crate::error::CycleError;
use crate::safety::deadman::Deadman;
use crate::state::LiveConfig;

/// Capacity of one periodic status line.
const REPORT_LINE_LEN: usize = 160;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    /// Minimum cycle duration [ns].
    pub min_cycle_ns: i64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Cycles that took longer than the period.
    pub overruns: u64,
    /// Maximum wake-up latency [ns].
    pub max_latency_ns: i64,
    /// Times the dead-man timeout cut a non-zero duty.
    pub deadman_trips: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
            deadman_trips: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns += duration_ns;
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Lock all current and future memory pages.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch 256 KiB of stack so the loop never faults it in.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

/// Pin the current thread to a CPU core.
#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

/// Set SCHED_FIFO with the given priority.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Full RT setup sequence for the calling thread.
///
/// Without the `rt` feature every step except stack prefaulting is a no-op.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// The control task.
pub struct CycleRunner {
    telemetry: Arc<dyn TelemetrySource>,
    actuator: Actuator,
    live: Arc<LiveConfig>,
    sink: Arc<dyn StatusSink>,
    filter: TelemetryFilter,
    deadman: Deadman,
    sensor_count: usize,
    period: Duration,
    report_interval: u32,
    /// Misordered pairs seen on the previous iteration.
    misordered: Misordered,
    /// Iterations since the last status report.
    since_report: u32,
    /// Timing and safety counters.
    pub stats: CycleStats,
}

impl CycleRunner {
    pub fn new(
        config: &UnitConfig,
        telemetry: Arc<dyn TelemetrySource>,
        actuator: Actuator,
        live: Arc<LiveConfig>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            telemetry,
            actuator,
            live,
            sink,
            filter: TelemetryFilter::new(config.filters),
            deadman: Deadman::new(config.cycle.deadman_timeout_s),
            sensor_count: config.hardware.temp_sensor_count,
            period: Duration::from_micros(u64::from(config.cycle.period_us)),
            report_interval: config.cycle.report_interval_cycles,
            misordered: Misordered::empty(),
            since_report: 0,
            stats: CycleStats::new(),
        }
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run one control iteration.
    pub fn step(&mut self) {
        // ═══ FILTER ═══
        let temp_max = max_temperature(
            (0..self.sensor_count).map(|i| self.telemetry.read_temperature(i)),
        );
        let filtered = self.filter.update(TelemetrySample {
            temp_max,
            voltage: self.telemetry.read_bus_voltage(),
            current: self.telemetry.read_input_current(),
        });
        let state = self.actuator.state();
        state.store_filtered(filtered.current, filtered.voltage, filtered.temp_max);

        // ═══ LIMITS ═══
        let limits = LimitSet::from_config(&self.live.load());
        if limits.misordered != self.misordered {
            if !limits.misordered.is_empty() {
                warn!(pairs = ?limits.misordered, "misordered limits, using conservative thresholds");
            }
            self.misordered = limits.misordered;
        }

        let temperature_allow = limits.temperature_allow(filtered.temp_max);
        self.actuator
            .set_limiting(temperature_allow < LIMIT_INDICATOR_THRESHOLD);
        let voltage_allow = limits.voltage_allow(filtered.voltage);

        // ═══ COMBINE + ENFORCE ═══
        let allowed = combine(temperature_allow, voltage_allow);
        state.store_allowances(temperature_allow, voltage_allow, allowed);
        if state.pwm_current() > allowed {
            self.actuator.set_duty(allowed);
        }

        // ═══ DEAD-MAN ═══
        if self
            .deadman
            .expired(self.actuator.clock().as_ref(), state.last_command_us())
        {
            if state.pwm_current() > 0.0 {
                self.stats.deadman_trips += 1;
                debug!(
                    pwm = state.pwm_current(),
                    timeout_s = self.deadman.timeout_s(),
                    "no duty request within window, output forced off"
                );
            }
            self.actuator.set_duty(0.0);
        }

        // ═══ AUTO LOAD ═══
        if let Some(target) = auto_load::target(&limits, filtered.voltage) {
            if target > 0.0 {
                self.actuator.set_duty(target);
            }
        }

        // ═══ REPORT ═══
        if self.report_interval > 0 {
            self.since_report += 1;
            if self.since_report >= self.report_interval {
                self.since_report = 0;
                self.report();
            }
        }
    }

    fn report(&self) {
        let s = self.actuator.state().snapshot();
        let mut line: heapless::String<REPORT_LINE_LEN> = heapless::String::new();
        // A full buffer truncates the line.
        let _ = write!(
            line,
            "pwm {:.3} max {:.3} V {:.2} I {:.2} T {:.1} overruns {} deadman {}",
            s.pwm_current,
            s.pwm_allowed_max,
            s.filtered_voltage,
            s.filtered_current,
            s.filtered_temp_max,
            self.stats.overruns,
            self.stats.deadman_trips,
        );
        self.sink.report(&line);
    }

    /// Loop until `running` is cleared, then switch the output off.
    pub fn run(&mut self, running: &AtomicBool) -> Result<(), CycleError> {
        info!(period_us = self.period.as_micros() as u64, "control loop started");

        #[cfg(feature = "rt")]
        let result = self.run_rt_loop(running);

        #[cfg(not(feature = "rt"))]
        let result = self.run_sim_loop(running);

        self.actuator.set_duty(0.0);
        info!(
            cycles = self.stats.cycle_count,
            avg_ns = self.stats.avg_cycle_ns(),
            max_ns = self.stats.max_cycle_ns,
            overruns = self.stats.overruns,
            deadman_trips = self.stats.deadman_trips,
            "control loop stopped"
        );
        result
    }

    fn note_overrun(&mut self, duration_ns: i64) {
        self.stats.overruns += 1;
        if self.stats.overruns == 1 {
            warn!(
                duration_ns,
                period_ns = self.period.as_nanos() as i64,
                "control cycle overrun"
            );
        }
    }

    /// RT cycle loop using `clock_nanosleep(TIMER_ABSTIME)`.
    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self, running: &AtomicBool) -> Result<(), CycleError> {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let period_ns = self.period.as_nanos() as i64;
        let mut next_wake = clock_gettime(clock)
            .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;

        while running.load(Ordering::Relaxed) {
            next_wake = timespec_add_ns(next_wake, period_ns);

            let cycle_start = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;

            self.step();

            let cycle_end = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
            let duration_ns = timespec_diff_ns(&cycle_end, &cycle_start);
            // Scheduled wake of this cycle was one period before `next_wake`.
            let latency_ns = timespec_diff_ns(&cycle_start, &next_wake) + period_ns;
            self.stats.record(duration_ns, latency_ns.abs());

            if duration_ns > period_ns {
                self.note_overrun(duration_ns);
            }

            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
        }
        Ok(())
    }

    /// Simulation cycle loop using `std::thread::sleep`.
    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self, running: &AtomicBool) -> Result<(), CycleError> {
        use std::time::Instant;

        while running.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();

            self.step();

            let elapsed = cycle_start.elapsed();
            let duration_ns = elapsed.as_nanos() as i64;
            self.stats.record(duration_ns, 0);

            if elapsed > self.period {
                self.note_overrun(duration_ns);
            }

            if let Some(remaining) = self.period.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
        Ok(())
    }
}

// ─── Time Helpers ───────────────────────────────────────────────────

/// Add nanoseconds to a TimeSpec.
#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    while nanos < 0 {
        secs -= 1;
        nanos += 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

/// Difference (a - b) in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}

// ─── Tests ──────────────────────────────────────────────────────────
