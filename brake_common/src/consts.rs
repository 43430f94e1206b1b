//! System-wide constants for the braking resistor workspace.
//!
//! Single source of truth for init markers, timing defaults and factory
//! values. Imported by all crates.

/// Marker written next to every retained field once it has been initialized.
pub const VAR_INIT_CODE: u32 = 59_763_641;

/// Signature of the current controller configuration layout.
///
/// Changes whenever the shape of `ResistorConfig` changes, so a firmware
/// update invalidates the stored configuration without touching the
/// redundant identity fields.
pub const MAIN_CONFIG_SIGNATURE: u32 = 2_740_403_854;

/// Size of the opaque hardware-specific blob in the retained record.
pub const HW_CONFIG_LEN: usize = 128;

/// Control cycle period in microseconds (1 kHz).
pub const CYCLE_TIME_US: u32 = 1000;

/// Lower bound for the control cycle period [µs].
pub const CYCLE_TIME_US_MIN: u32 = 100;

/// Upper bound for the control cycle period [µs].
pub const CYCLE_TIME_US_MAX: u32 = 100_000;

/// Dead-man window: output is forced to zero when no duty request has been
/// accepted for longer than this [s].
pub const DEADMAN_TIMEOUT_S: f32 = 2.0;

/// Automatic load shedding is active only above this maximum fraction.
pub const AUTO_LOAD_ENABLE_FRACTION: f32 = 0.02;

/// Temperature allowance below which the limiting indicator is lit.
pub const LIMIT_INDICATOR_THRESHOLD: f32 = 0.9;

/// Duty above which the active indicator is lit.
pub const ACTIVE_INDICATOR_THRESHOLD: f32 = 0.001;

/// Per-iteration smoothing constant for the input current filter.
pub const CURRENT_FILTER_ALPHA: f32 = 0.01;

/// Per-iteration smoothing constant for the temperature filter.
pub const TEMPERATURE_FILTER_ALPHA: f32 = 0.05;

/// Per-iteration smoothing constant for the bus voltage filter.
pub const VOLTAGE_FILTER_ALPHA: f32 = 0.5;

/// Wait for USB negotiation on every Nth boot.
pub const USB_WAIT_EVERY_N_BOOTS: u32 = 3;

/// Length of the USB negotiation window [ms].
pub const USB_WAIT_WINDOW_MS: u64 = 500;

/// Factory status broadcast rate [Hz].
pub const DEFAULT_STATUS_RATE_HZ: u32 = 50;

/// Upper bound for the status broadcast rate [Hz].
pub const STATUS_RATE_HZ_MAX: u32 = 1000;

/// Default period between identity mirroring passes [ms].
pub const MIRROR_PERIOD_MS: u64 = 1;

/// Default status report interval [cycles].
pub const REPORT_INTERVAL_CYCLES: u32 = 1000;

/// Default path of the retained memory image.
pub const DEFAULT_RETAINED_PATH: &str = "/dev/shm/brake_retained.bin";

/// Default path of the non-volatile storage image.
pub const DEFAULT_NV_PATH: &str = "/var/lib/brake/nv_record.bin";
