//! Retained record recovery.
//!
//! Evaluated once at startup:
//! 1. Check every init marker of the retained image.
//! 2. If any marker is wrong, replace the whole image with the copy from
//!    non-volatile storage when one exists.
//! 3. Re-check every marker and give each still-invalid field its default.
//!    The configuration, when reset, inherits identity, rate and baud from
//!    the redundant fields so they survive a configuration layout change.
//! 4. Clamp the configuration into the hardware envelope.
//!
//! Nothing here fails: every anomaly ends in a default and a log line.

use brake_common::consts::{MAIN_CONFIG_SIGNATURE, VAR_INIT_CODE};
use brake_common::control::config::FactoryDefaults;
use brake_common::control::retained::{RecordFields, RetainedRecord, zeroed_blob};
use brake_common::hal::config::HardwareDescriptor;
use brake_common::hal::driver::{HalError, NvStorage};
use tracing::{debug, info, warn};

/// What recovery found and did.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryReport {
    /// Fields whose marker was wrong in the retained image.
    pub invalid: RecordFields,
    /// Whether the image was replaced by the non-volatile copy.
    pub reloaded: bool,
    /// Non-volatile storage failure, if the reload was attempted and failed.
    pub storage_error: Option<HalError>,
    /// Fields that received their default.
    pub defaulted: RecordFields,
}

impl RecoveryReport {
    /// True when the retained image was used as-is.
    pub fn clean(&self) -> bool {
        self.invalid.is_empty()
    }
}

/// Validate `retained` and repair it field by field.
///
/// `None` stands for an unreadable image; it is treated as blank memory.
pub fn recover(
    retained: Option<RetainedRecord>,
    nv: &dyn NvStorage,
    defaults: &FactoryDefaults,
    hw: &HardwareDescriptor,
) -> (RetainedRecord, RecoveryReport) {
    let hw_flag = hw.hw_config_init_flag();
    let mut record = retained.unwrap_or_else(RetainedRecord::blank);
    let invalid = record.invalid_fields(hw_flag);

    let mut reloaded = false;
    let mut storage_error = None;
    if !invalid.is_empty() {
        debug!(?invalid, "retained image has invalid markers");
        match nv.load_record() {
            Ok(Some(stored)) => {
                info!("retained image replaced from non-volatile storage");
                record = stored;
                reloaded = true;
            }
            Ok(None) => info!("no record in non-volatile storage"),
            Err(e) => {
                warn!("non-volatile storage unavailable, using defaults: {e}");
                storage_error = Some(e);
            }
        }
    }

    let defaulted = record.invalid_fields(hw_flag);
    apply_defaults(&mut record, defaulted, defaults, hw);
    record.config.apply_hw_limits(hw);

    if !defaulted.is_empty() {
        warn!(?defaulted, "retained fields reset to defaults");
    }

    let report = RecoveryReport {
        invalid,
        reloaded,
        storage_error,
        defaulted,
    };
    (record, report)
}

fn apply_defaults(
    record: &mut RetainedRecord,
    fields: RecordFields,
    defaults: &FactoryDefaults,
    hw: &HardwareDescriptor,
) {
    if fields.contains(RecordFields::CONTROLLER_ID) {
        record.controller_id = defaults.controller_id(hw);
        record.controller_id_init_flag = VAR_INIT_CODE;
    }
    if fields.contains(RecordFields::STATUS_RATE) {
        record.status_rate_hz = defaults.status_rate_hz;
        record.status_rate_hz_init_flag = VAR_INIT_CODE;
    }
    if fields.contains(RecordFields::CAN_BAUD) {
        record.can_baud_rate = defaults.can_baud_rate;
        record.can_baud_rate_init_flag = VAR_INIT_CODE;
    }
    if fields.contains(RecordFields::WRITE_COUNT) {
        record.write_count = 0;
        record.write_count_init_flag = VAR_INIT_CODE;
    }
    if fields.contains(RecordFields::BOOT_COUNT) {
        record.boot_count = 0;
        record.boot_count_init_flag = VAR_INIT_CODE;
    }
    if fields.contains(RecordFields::HW_CONFIG) {
        record.hw_config = zeroed_blob();
        record.hw_config_init_flag = hw.hw_config_init_flag();
    }
    if fields.contains(RecordFields::CONFIG) {
        let mut config = defaults.config(hw);
        config.controller_id = record.controller_id;
        config.status_rate_hz = record.status_rate_hz;
        config.can_baud_rate = record.can_baud_rate;
        record.config = config;
        record.config_signature = MAIN_CONFIG_SIGNATURE;
    }
}
