//! Retained record.
//!
//! The record lives in memory that survives a reset and is mirrored to
//! non-volatile storage on every config store. Each identity field carries
//! its own init marker so a partially corrupted image can be repaired field
//! by field instead of falling back to factory defaults wholesale.

use bitflags::bitflags;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use static_assertions::{assert_impl_all, const_assert_eq};

use super::config::{CanBaud, ResistorConfig};
use crate::consts::{HW_CONFIG_LEN, MAIN_CONFIG_SIGNATURE, VAR_INIT_CODE};

bitflags! {
    /// Fields of a [`RetainedRecord`], used to report which markers are bad.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RecordFields: u8 {
        const CONTROLLER_ID = 0x01;
        const STATUS_RATE   = 0x02;
        const CAN_BAUD      = 0x04;
        const WRITE_COUNT   = 0x08;
        const BOOT_COUNT    = 0x10;
        const HW_CONFIG     = 0x20;
        const CONFIG        = 0x40;
    }
}

const_assert_eq!(RecordFields::all().bits(), 0x7F);

/// Opaque per-board blob.
pub type HwConfigBlob = Vec<u8, HW_CONFIG_LEN>;

/// Record preserved across resets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetainedRecord {
    pub controller_id_init_flag: u32,
    pub controller_id: u8,

    pub status_rate_hz_init_flag: u32,
    pub status_rate_hz: u32,

    pub can_baud_rate_init_flag: u32,
    pub can_baud_rate: CanBaud,

    pub write_count_init_flag: u32,
    /// Number of config stores since the record was created.
    pub write_count: u32,

    pub boot_count_init_flag: u32,
    /// Boots since the last USB wait window.
    pub boot_count: u32,

    pub hw_config_init_flag: u32,
    pub hw_config: HwConfigBlob,

    pub config_signature: u32,
    pub config: ResistorConfig,
}

assert_impl_all!(RetainedRecord: Send, Sync, Clone);

impl RetainedRecord {
    /// Image of freshly powered memory: every marker invalid, every value zero.
    pub fn blank() -> Self {
        Self {
            controller_id_init_flag: 0,
            controller_id: 0,
            status_rate_hz_init_flag: 0,
            status_rate_hz: 0,
            can_baud_rate_init_flag: 0,
            can_baud_rate: CanBaud::Baud125K,
            write_count_init_flag: 0,
            write_count: 0,
            boot_count_init_flag: 0,
            boot_count: 0,
            hw_config_init_flag: 0,
            hw_config: zeroed_blob(),
            config_signature: 0,
            config: ResistorConfig::default(),
        }
    }

    /// Fields whose init marker does not match the expected value.
    ///
    /// `hw_flag` is the board's marker for the hardware blob. A blob of the
    /// wrong length counts as invalid regardless of its marker.
    pub fn invalid_fields(&self, hw_flag: u32) -> RecordFields {
        let mut bad = RecordFields::empty();
        bad.set(
            RecordFields::CONTROLLER_ID,
            self.controller_id_init_flag != VAR_INIT_CODE,
        );
        bad.set(
            RecordFields::STATUS_RATE,
            self.status_rate_hz_init_flag != VAR_INIT_CODE,
        );
        bad.set(
            RecordFields::CAN_BAUD,
            self.can_baud_rate_init_flag != VAR_INIT_CODE,
        );
        bad.set(
            RecordFields::WRITE_COUNT,
            self.write_count_init_flag != VAR_INIT_CODE,
        );
        bad.set(
            RecordFields::BOOT_COUNT,
            self.boot_count_init_flag != VAR_INIT_CODE,
        );
        bad.set(
            RecordFields::HW_CONFIG,
            self.hw_config_init_flag != hw_flag || self.hw_config.len() != HW_CONFIG_LEN,
        );
        bad.set(
            RecordFields::CONFIG,
            self.config_signature != MAIN_CONFIG_SIGNATURE,
        );
        bad
    }

    /// Copy identity fields from the live config into the record.
    pub fn mirror_identity(&mut self, config: &ResistorConfig) {
        self.controller_id = config.controller_id;
        self.status_rate_hz = config.status_rate_hz;
        self.can_baud_rate = config.can_baud_rate;
    }
}

/// Hardware blob of `HW_CONFIG_LEN` zero bytes.
pub fn zeroed_blob() -> HwConfigBlob {
    let mut blob = HwConfigBlob::new();
    // Capacity equals the fill length.
    let _ = blob.resize(HW_CONFIG_LEN, 0);
    blob
}
