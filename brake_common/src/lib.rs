//! Braking Resistor Common Library
//!
//! Shared constants, configuration types and hardware contracts used by
//! every crate in the braking resistor workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Init markers, timing defaults and factory values
//! - [`config`] - Configuration loading traits and types
//! - [`control`] - Controller configuration and the retained record
//! - [`hal`] - Hardware descriptor and hardware-facing traits
//! - [`clock`] - Monotonic time source abstraction
//! - [`sync`] - Single-writer atomic scalars
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use brake_common::prelude::*;
//!
//! let cfg = ResistorConfig::default();
//! assert!(cfg.validate().is_ok());
//! ```

pub mod clock;
pub mod config;
pub mod consts;
pub mod control;
pub mod hal;
pub mod prelude;
pub mod sync;
