//! Monotonic time source.
//!
//! The control loop and the actuator stamp and compare times through the
//! [`Clock`] trait so the dead-man policy can be driven deterministically in
//! tests. Timestamps are microseconds since an arbitrary origin.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Source of monotonic timestamps [µs].
pub trait Clock: Send + Sync {
    /// Current time in microseconds since the clock origin.
    fn now_us(&self) -> u64;

    /// Seconds elapsed since `since_us`, saturating at zero.
    fn age_s(&self, since_us: u64) -> f32 {
        self.now_us().saturating_sub(since_us) as f32 / 1_000_000.0
    }
}

/// Wall clock backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// Manually advanced clock for tests and lock-step simulation.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_us: AtomicU64,
}

impl ManualClock {
    /// Create a clock starting at `start_us`.
    pub const fn new(start_us: u64) -> Self {
        Self {
            now_us: AtomicU64::new(start_us),
        }
    }

    /// Advance by `us` microseconds.
    pub fn advance_us(&self, us: u64) {
        self.now_us.fetch_add(us, Ordering::Relaxed);
    }

    /// Advance by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms * 1000);
    }

    /// Jump to an absolute time.
    pub fn set_us(&self, us: u64) {
        self.now_us.store(us, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now_us.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(10);
        assert_eq!(clock.now_us(), 10);
        clock.advance_ms(2);
        assert_eq!(clock.now_us(), 2010);
        clock.set_us(5);
        assert_eq!(clock.now_us(), 5);
    }

    #[test]
    fn age_saturates_for_future_stamps() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.age_s(5_000), 0.0);
        assert!((clock.age_s(0) - 0.001).abs() < 1e-9);
    }

    #[test]
    fn monotonic_clock_does_not_go_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now_us();
        let b = clock.now_us();
        assert!(b >= a);
    }
}
