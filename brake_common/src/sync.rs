//! Lock-free scalar cells shared between the control task and the command path.

use std::sync::atomic::{AtomicU32, Ordering};

/// `f32` stored in an `AtomicU32` as raw bits.
///
/// Each cell has exactly one writer; readers accept a value that is one
/// iteration stale. All accesses are `Relaxed`.
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub const fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}
