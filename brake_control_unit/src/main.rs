//! # Braking Resistor Control Unit
//!
//! Fixed-period safety loop driving the braking resistor PWM.
//!
//! Startup recovers the retained record (falling back to the NV copy and
//! then to factory defaults), optionally holds the USB service window,
//! programs the timer and enters the control cycle. Side threads keep the
//! retained identity mirrored, step the simulated plant and serve the
//! terminal.

use brake_common::clock::{Clock, MonotonicClock};
use brake_common::consts::USB_WAIT_WINDOW_MS;
use brake_common::hal::driver::StatusSink;
use brake_control_unit::config::{UnitConfig, load_config};
use brake_control_unit::cycle::rt_setup;
use brake_control_unit::unit::{Backends, ControlUnit};
use brake_hal::{FileRetained, FileStorage, SimulationDriver, StdoutSink, TracingSink};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Braking resistor control unit
#[derive(Parser, Debug)]
#[command(name = "brake_control_unit")]
#[command(version)]
#[command(about = "Thermal and voltage limited PWM safety loop for a braking resistor")]
struct Args {
    /// Path to the unit configuration TOML. Compiled-in defaults when omitted.
    config: Option<PathBuf>,

    /// Run against the simulated power stage.
    #[arg(long)]
    simulate: bool,

    /// Regenerative current fed into the simulated bus [A].
    #[arg(long, default_value_t = 0.0)]
    regen_amps: f32,

    /// Read terminal commands from stdin.
    #[arg(long)]
    terminal: bool,

    /// CPU core to pin the RT thread to (default: 1).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (default: 80).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let loaded = read_config(&args);

    let directive = match (&loaded, args.verbose) {
        (_, true) => "debug",
        (Ok(config), false) => config.shared.log_level.as_directive(),
        (Err(_), false) => "info",
    };
    setup_tracing(&args, directive);

    info!(
        "Brake Control Unit v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let result = loaded
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|config| run(&args, config));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Brake Control Unit shutdown complete");
}

fn read_config(args: &Args) -> Result<UnitConfig, brake_common::config::ConfigError> {
    match &args.config {
        Some(path) => load_config(path),
        None => {
            let config = UnitConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn run(args: &Args, config: UnitConfig) -> Result<(), Box<dyn std::error::Error>> {
    match &args.config {
        Some(path) => info!("Config loaded from {}", path.display()),
        None => warn!("No config path given, using compiled-in defaults"),
    }
    info!(
        service = %config.shared.service_name,
        hardware = %config.hardware.name,
        period_us = config.cycle.period_us,
        "Config OK"
    );

    if !args.simulate {
        return Err("no hardware backend on this host, run with --simulate".into());
    }

    let plant = Arc::new(SimulationDriver::new(config.simulation.clone()));
    plant.set_regen_current(args.regen_amps);

    let backends = Backends {
        telemetry: plant.clone(),
        pwm: plant.clone(),
        clock: Arc::new(MonotonicClock::new()),
        retained: Arc::new(FileRetained::new(&config.storage.retained_path)),
        nv: Arc::new(FileStorage::new(&config.storage.nv_path)),
        sink: Arc::new(TracingSink),
    };
    let clock = backends.clock.clone();
    let mut unit = ControlUnit::assemble(&config, backends)?;
    if !unit.recovery.clean() {
        warn!(
            invalid = ?unit.recovery.invalid,
            reloaded = unit.recovery.reloaded,
            "Retained record was repaired at startup"
        );
    }

    match unit.persisted.usb_boot_window() {
        Ok(true) => {
            info!("Holding USB service window for {USB_WAIT_WINDOW_MS} ms");
            thread::sleep(Duration::from_millis(USB_WAIT_WINDOW_MS));
        }
        Ok(false) => {}
        Err(e) => warn!("Boot counter not updated: {e}"),
    }

    // Setup signal handler for graceful shutdown.
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let mut workers = Vec::new();

    // ── Plant model ──
    {
        let plant = plant.clone();
        let running = running.clone();
        let period = unit.runner.period();
        workers.push(thread::Builder::new().name("plant".into()).spawn(move || {
            let mut last = Instant::now();
            while running.load(Ordering::Relaxed) {
                thread::sleep(period);
                let now = Instant::now();
                plant.step(now - last);
                last = now;
            }
        })?);
    }

    // ── Identity mirror ──
    {
        let persisted = unit.persisted.clone();
        let live = unit.live.clone();
        let running = running.clone();
        let period = Duration::from_millis(config.cycle.mirror_period_ms);
        workers.push(thread::Builder::new().name("mirror".into()).spawn(move || {
            let mut failing = false;
            while running.load(Ordering::Relaxed) {
                match persisted.mirror(&live.load()) {
                    Ok(_) if failing => {
                        info!("Retained memory writable again");
                        failing = false;
                    }
                    Ok(_) => {}
                    Err(e) if !failing => {
                        warn!("Retained mirror failed: {e}");
                        failing = true;
                    }
                    Err(_) => {}
                }
                thread::sleep(period);
            }
        })?);
    }

    // ── Terminal ──
    // Blocks on stdin, so it is left detached at shutdown.
    if args.terminal {
        let sink: Arc<dyn StatusSink> = Arc::new(StdoutSink);
        let terminal = unit.terminal(sink);
        let running = running.clone();
        thread::Builder::new().name("terminal".into()).spawn(move || {
            for line in std::io::stdin().lock().lines() {
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                match line {
                    Ok(line) => terminal.execute(&line),
                    Err(e) => {
                        warn!("Terminal input closed: {e}");
                        break;
                    }
                }
            }
        })?;
    }

    // RT setup (mlockall, affinity, scheduler).
    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        "RT setup complete (cpu_core={}, priority={})",
        args.cpu_core, args.rt_priority
    );

    info!(started_us = clock.now_us(), "Entering control loop");
    let result = unit.runner.run(&running);
    running.store(false, Ordering::SeqCst);

    for worker in workers {
        if worker.join().is_err() {
            warn!("Worker thread panicked");
        }
    }

    if let Err(e) = result {
        error!("Control loop error: {e}");
        return Err(Box::new(e));
    }
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args, default_directive: &str) {
    let filter = if args.verbose {
        EnvFilter::new(default_directive)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
