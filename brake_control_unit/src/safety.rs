//! Safety module root.
//!
//! Dead-man supervision of the duty command stream.

pub mod deadman;
