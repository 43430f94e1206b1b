//! Persisted configuration.
//!
//! - [`recovery`] - Startup validation of the retained record
//! - [`store`] - Owned record with mirroring, config store and boot window

pub mod recovery;
pub mod store;
