//! Owned persisted state.
//!
//! `PersistedState` owns the recovered record and the two memories behind
//! it. All writes go through one mutex so the retained image and the
//! non-volatile copy never interleave.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use brake_common::consts::USB_WAIT_EVERY_N_BOOTS;
use brake_common::control::config::{FactoryDefaults, ResistorConfig};
use brake_common::control::retained::RetainedRecord;
use brake_common::hal::config::HardwareDescriptor;
use brake_common::hal::driver::{HalError, NvStorage, RetainedMemory};
use tracing::{debug, info, warn};

use super::recovery::{RecoveryReport, recover};

/// Retained record plus its backing memories.
pub struct PersistedState {
    record: Mutex<RetainedRecord>,
    retained: Arc<dyn RetainedMemory>,
    nv: Arc<dyn NvStorage>,
}

impl PersistedState {
    /// Read the retained image, recover it and write the repaired image back.
    pub fn open(
        retained: Arc<dyn RetainedMemory>,
        nv: Arc<dyn NvStorage>,
        defaults: &FactoryDefaults,
        hw: &HardwareDescriptor,
    ) -> (Self, RecoveryReport) {
        let image = match retained.read() {
            Ok(image) => image,
            Err(e) => {
                warn!("retained memory unreadable: {e}");
                None
            }
        };

        let (record, report) = recover(image, nv.as_ref(), defaults, hw);
        if let Err(e) = retained.write(&record) {
            warn!("failed to write recovered image to retained memory: {e}");
        }
        info!(
            controller_id = record.controller_id,
            write_count = record.write_count,
            reloaded = report.reloaded,
            "persisted state open"
        );

        let state = Self {
            record: Mutex::new(record),
            retained,
            nv,
        };
        (state, report)
    }

    /// Copy of the current record.
    pub fn record(&self) -> RetainedRecord {
        self.lock().clone()
    }

    /// Configuration held in the record.
    pub fn config(&self) -> ResistorConfig {
        self.lock().config
    }

    /// Mirror the live configuration into the record.
    ///
    /// Identity, rate and baud also go to the redundant fields. The retained
    /// image is written only when something changed. Returns whether it was.
    pub fn mirror(&self, live: &ResistorConfig) -> Result<bool, HalError> {
        let mut record = self.lock();
        let before = (
            record.controller_id,
            record.status_rate_hz,
            record.can_baud_rate,
            record.config,
        );
        record.config = *live;
        record.mirror_identity(live);
        if before
            == (
                record.controller_id,
                record.status_rate_hz,
                record.can_baud_rate,
                record.config,
            )
        {
            return Ok(false);
        }
        self.retained.write(&record)?;
        debug!(controller_id = record.controller_id, "live config mirrored");
        Ok(true)
    }

    /// Store `config` in retained memory and non-volatile storage.
    ///
    /// Returns the new write count. On failure the held record is left as
    /// it was, and the retained image is restored when it was already written.
    pub fn store(&self, config: &ResistorConfig) -> Result<u32, HalError> {
        let mut record = self.lock();
        let mut updated = record.clone();
        updated.write_count = updated.write_count.wrapping_add(1);
        updated.config = *config;
        updated.mirror_identity(config);

        self.retained.write(&updated)?;
        if let Err(e) = self.nv.save_record(&updated) {
            if let Err(restore) = self.retained.write(&record) {
                warn!("failed to restore retained image after store failure: {restore}");
            }
            return Err(e);
        }

        *record = updated;
        info!(write_count = record.write_count, "configuration stored");
        Ok(record.write_count)
    }

    /// Advance the boot counter.
    ///
    /// Returns `true` on every Nth boot, when the caller should hold off
    /// for the USB negotiation window. The counter restarts at zero then.
    pub fn usb_boot_window(&self) -> Result<bool, HalError> {
        let mut record = self.lock();
        let wait = record.boot_count >= USB_WAIT_EVERY_N_BOOTS;
        if wait {
            record.boot_count = 0;
        } else {
            record.boot_count += 1;
        }
        self.retained.write(&record)?;
        Ok(wait)
    }

    fn lock(&self) -> MutexGuard<'_, RetainedRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
