//! Shared controller state.
//!
//! Every field has exactly one writer:
//!
//! | Field                                   | Writer            |
//! |-----------------------------------------|-------------------|
//! | `filtered_*`, `*_allow`, `pwm_allowed_max` | control task   |
//! | `pwm_current`, `last_command_us`        | actuator          |
//! | [`LiveConfig`]                          | command authority |
//!
//! Readers tolerate a value that is one iteration stale, so all cells are
//! relaxed atomics and no lock is taken on the control path. `LiveConfig`
//! additionally carries a generation counter so a reader never sees a mix
//! of two configurations.

use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering, fence};

use brake_common::control::config::{CanBaud, ResistorConfig};
use brake_common::sync::AtomicF32;
use static_assertions::assert_impl_all;

// ─── Controller state ───────────────────────────────────────────────

/// Process-wide controller state.
#[derive(Debug)]
pub struct ControllerState {
    /// Time of the last accepted duty request [µs, clock domain].
    last_command_us: AtomicU64,
    filtered_current: AtomicF32,
    filtered_voltage: AtomicF32,
    filtered_temp_max: AtomicF32,
    temperature_allow: AtomicF32,
    voltage_allow: AtomicF32,
    pwm_current: AtomicF32,
    pwm_allowed_max: AtomicF32,
}

assert_impl_all!(ControllerState: Send, Sync);

impl ControllerState {
    /// Output off, ceiling fully open, filters at zero.
    pub fn new(now_us: u64) -> Self {
        Self {
            last_command_us: AtomicU64::new(now_us),
            filtered_current: AtomicF32::new(0.0),
            filtered_voltage: AtomicF32::new(0.0),
            filtered_temp_max: AtomicF32::new(0.0),
            temperature_allow: AtomicF32::new(1.0),
            voltage_allow: AtomicF32::new(1.0),
            pwm_current: AtomicF32::new(0.0),
            pwm_allowed_max: AtomicF32::new(1.0),
        }
    }

    #[inline]
    pub fn last_command_us(&self) -> u64 {
        self.last_command_us.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn pwm_current(&self) -> f32 {
        self.pwm_current.load()
    }

    #[inline]
    pub fn pwm_allowed_max(&self) -> f32 {
        self.pwm_allowed_max.load()
    }

    #[inline]
    pub fn filtered_current(&self) -> f32 {
        self.filtered_current.load()
    }

    #[inline]
    pub fn filtered_voltage(&self) -> f32 {
        self.filtered_voltage.load()
    }

    #[inline]
    pub fn filtered_temp_max(&self) -> f32 {
        self.filtered_temp_max.load()
    }

    #[inline]
    pub fn temperature_allow(&self) -> f32 {
        self.temperature_allow.load()
    }

    #[inline]
    pub fn voltage_allow(&self) -> f32 {
        self.voltage_allow.load()
    }

    // ── Control task writers ──

    pub(crate) fn store_filtered(&self, current: f32, voltage: f32, temp_max: f32) {
        self.filtered_current.store(current);
        self.filtered_voltage.store(voltage);
        self.filtered_temp_max.store(temp_max);
    }

    pub(crate) fn store_allowances(&self, temperature: f32, voltage: f32, combined: f32) {
        self.temperature_allow.store(temperature);
        self.voltage_allow.store(voltage);
        self.pwm_allowed_max.store(combined);
    }

    // ── Actuator writers ──

    pub(crate) fn store_command(&self, pwm: f32, now_us: u64) {
        self.pwm_current.store(pwm);
        self.last_command_us.store(now_us, Ordering::Relaxed);
    }

    /// Copy of every field.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            pwm_current: self.pwm_current(),
            pwm_allowed_max: self.pwm_allowed_max(),
            temperature_allow: self.temperature_allow(),
            voltage_allow: self.voltage_allow(),
            filtered_current: self.filtered_current(),
            filtered_voltage: self.filtered_voltage(),
            filtered_temp_max: self.filtered_temp_max(),
            last_command_us: self.last_command_us(),
        }
    }
}

/// Point-in-time copy of [`ControllerState`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusSnapshot {
    pub pwm_current: f32,
    pub pwm_allowed_max: f32,
    pub temperature_allow: f32,
    pub voltage_allow: f32,
    pub filtered_current: f32,
    pub filtered_voltage: f32,
    pub filtered_temp_max: f32,
    pub last_command_us: u64,
}

// ─── Live configuration ─────────────────────────────────────────────

/// Controller configuration as seen by the control task.
///
/// Written only by the command authority. Updates are published under a
/// generation counter that is odd while a write is in progress; a reader
/// that overlaps a write retries.
#[derive(Debug)]
pub struct LiveConfig {
    generation: AtomicU32,
    controller_id: AtomicU8,
    status_rate_hz: AtomicU32,
    can_baud_rate: AtomicU8,
    temp_lim_start: AtomicF32,
    temp_lim_end: AtomicF32,
    volt_lower_lim_start: AtomicF32,
    volt_lower_lim_end: AtomicF32,
    load_volt_start: AtomicF32,
    load_volt_max: AtomicF32,
    load_volt_max_fraction: AtomicF32,
}

assert_impl_all!(LiveConfig: Send, Sync);

impl LiveConfig {
    pub fn new(config: &ResistorConfig) -> Self {
        Self {
            generation: AtomicU32::new(0),
            controller_id: AtomicU8::new(config.controller_id),
            status_rate_hz: AtomicU32::new(config.status_rate_hz),
            can_baud_rate: AtomicU8::new(config.can_baud_rate as u8),
            temp_lim_start: AtomicF32::new(config.temp_lim_start),
            temp_lim_end: AtomicF32::new(config.temp_lim_end),
            volt_lower_lim_start: AtomicF32::new(config.volt_lower_lim_start),
            volt_lower_lim_end: AtomicF32::new(config.volt_lower_lim_end),
            load_volt_start: AtomicF32::new(config.load_volt_start),
            load_volt_max: AtomicF32::new(config.load_volt_max),
            load_volt_max_fraction: AtomicF32::new(config.load_volt_max_fraction),
        }
    }

    /// Consistent copy of the configuration.
    pub fn load(&self) -> ResistorConfig {
        loop {
            let before = self.generation.load(Ordering::Acquire);
            if before % 2 == 0 {
                let config = self.read_cells();
                fence(Ordering::Acquire);
                if self.generation.load(Ordering::Relaxed) == before {
                    return config;
                }
            }
            std::hint::spin_loop();
        }
    }

    /// Number of completed updates.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire) / 2
    }

    fn read_cells(&self) -> ResistorConfig {
        ResistorConfig {
            controller_id: self.controller_id.load(Ordering::Relaxed),
            status_rate_hz: self.status_rate_hz.load(Ordering::Relaxed),
            can_baud_rate: CanBaud::from_u8(self.can_baud_rate.load(Ordering::Relaxed))
                .unwrap_or_default(),
            temp_lim_start: self.temp_lim_start.load(),
            temp_lim_end: self.temp_lim_end.load(),
            volt_lower_lim_start: self.volt_lower_lim_start.load(),
            volt_lower_lim_end: self.volt_lower_lim_end.load(),
            load_volt_start: self.load_volt_start.load(),
            load_volt_max: self.load_volt_max.load(),
            load_volt_max_fraction: self.load_volt_max_fraction.load(),
        }
    }

    pub(crate) fn store(&self, config: &ResistorConfig) {
        let mut current = self.generation.load(Ordering::Relaxed);
        loop {
            if current % 2 == 1 {
                std::hint::spin_loop();
                current = self.generation.load(Ordering::Relaxed);
                continue;
            }
            match self.generation.compare_exchange_weak(
                current,
                current.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(seen) => current = seen,
            }
        }
        fence(Ordering::Release);

        self.controller_id
            .store(config.controller_id, Ordering::Relaxed);
        self.status_rate_hz
            .store(config.status_rate_hz, Ordering::Relaxed);
        self.can_baud_rate
            .store(config.can_baud_rate as u8, Ordering::Relaxed);
        self.temp_lim_start.store(config.temp_lim_start);
        self.temp_lim_end.store(config.temp_lim_end);
        self.volt_lower_lim_start.store(config.volt_lower_lim_start);
        self.volt_lower_lim_end.store(config.volt_lower_lim_end);
        self.load_volt_start.store(config.load_volt_start);
        self.load_volt_max.store(config.load_volt_max);
        self.load_volt_max_fraction
            .store(config.load_volt_max_fraction);

        self.generation
            .store(current.wrapping_add(2), Ordering::Release);
    }
}
