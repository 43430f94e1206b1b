//! Dead-man timeout.
//!
//! If no duty request has been accepted for longer than the window, the
//! output is forced to zero. Forcing zero is itself an accepted request,
//! so the timer re-arms and fires again one window later.

use brake_common::clock::Clock;

/// Command staleness supervisor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadman {
    timeout_s: f32,
}

impl Deadman {
    pub const fn new(timeout_s: f32) -> Self {
        Self { timeout_s }
    }

    #[inline]
    pub fn timeout_s(&self) -> f32 {
        self.timeout_s
    }

    /// True when the last command is older than the window.
    #[inline]
    pub fn expired(&self, clock: &dyn Clock, last_command_us: u64) -> bool {
        clock.age_s(last_command_us) > self.timeout_s
    }
}
