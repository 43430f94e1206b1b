//! Record storage backends.
//!
//! The retained record is persisted with bincode inside a small versioned
//! envelope. The configuration travels as a separate length-prefixed blob:
//! when its layout changes between firmware versions only the configuration
//! fails to decode, while identity, counters and the hardware blob are still
//! read back. Files are written to a temporary sibling and renamed into
//! place, so a reader never observes a half-written record.
//!
//! - [`FileStorage`] - non-volatile copy (`NvStorage`)
//! - [`FileRetained`] - reset-surviving image (`RetainedMemory`), typically on tmpfs
//! - [`MemoryStorage`] - in-process backend for both traits

use bincode::Options;
use brake_common::control::config::{CanBaud, ResistorConfig};
use brake_common::control::retained::{HwConfigBlob, RetainedRecord};
use brake_common::hal::driver::{HalError, NvStorage, RetainedMemory};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Envelope format version, written ahead of the record.
const ENVELOPE_VERSION: u32 = 1;

/// Codec for the configuration blob. Trailing bytes are rejected so a blob
/// written by a longer layout does not decode either.
fn config_codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Record fields stored ahead of the configuration blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredHeader {
    controller_id_init_flag: u32,
    controller_id: u8,
    status_rate_hz_init_flag: u32,
    status_rate_hz: u32,
    can_baud_rate_init_flag: u32,
    can_baud_rate: CanBaud,
    write_count_init_flag: u32,
    write_count: u32,
    boot_count_init_flag: u32,
    boot_count: u32,
    hw_config_init_flag: u32,
    hw_config: HwConfigBlob,
    config_signature: u32,
}

/// On-disk record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredRecord {
    /// Unix epoch seconds of the write.
    saved_at: u64,
    header: StoredHeader,
    /// `ResistorConfig` encoded with [`config_codec`].
    config_bytes: Vec<u8>,
}

impl StoredRecord {
    fn from_record(record: &RetainedRecord, saved_at: u64) -> Result<Self, HalError> {
        let config_bytes = config_codec()
            .serialize(&record.config)
            .map_err(|e| HalError::PersistenceError(format!("failed to encode config: {e}")))?;
        Ok(Self {
            saved_at,
            header: StoredHeader {
                controller_id_init_flag: record.controller_id_init_flag,
                controller_id: record.controller_id,
                status_rate_hz_init_flag: record.status_rate_hz_init_flag,
                status_rate_hz: record.status_rate_hz,
                can_baud_rate_init_flag: record.can_baud_rate_init_flag,
                can_baud_rate: record.can_baud_rate,
                write_count_init_flag: record.write_count_init_flag,
                write_count: record.write_count,
                boot_count_init_flag: record.boot_count_init_flag,
                boot_count: record.boot_count,
                hw_config_init_flag: record.hw_config_init_flag,
                hw_config: record.hw_config.clone(),
                config_signature: record.config_signature,
            },
            config_bytes,
        })
    }

    /// Rebuild the record. A configuration blob that does not decode
    /// exactly leaves the configuration signature invalid.
    fn into_record(self) -> RetainedRecord {
        let h = self.header;
        let decoded: Result<ResistorConfig, _> = config_codec().deserialize(&self.config_bytes);
        let (config, config_signature) = match decoded {
            Ok(config) => (config, h.config_signature),
            Err(e) => {
                warn!(
                    len = self.config_bytes.len(),
                    "stored config has a different layout, marking it invalid: {e}"
                );
                (ResistorConfig::default(), 0)
            }
        };
        RetainedRecord {
            controller_id_init_flag: h.controller_id_init_flag,
            controller_id: h.controller_id,
            status_rate_hz_init_flag: h.status_rate_hz_init_flag,
            status_rate_hz: h.status_rate_hz,
            can_baud_rate_init_flag: h.can_baud_rate_init_flag,
            can_baud_rate: h.can_baud_rate,
            write_count_init_flag: h.write_count_init_flag,
            write_count: h.write_count,
            boot_count_init_flag: h.boot_count_init_flag,
            boot_count: h.boot_count,
            hw_config_init_flag: h.hw_config_init_flag,
            hw_config: h.hw_config,
            config_signature,
            config,
        }
    }
}

fn write_record(path: &Path, record: &RetainedRecord) -> Result<(), HalError> {
    let saved_at = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    write_stored(path, &StoredRecord::from_record(record, saved_at)?)
}

fn write_stored(path: &Path, stored: &StoredRecord) -> Result<(), HalError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            HalError::PersistenceError(format!("failed to create directory: {e}"))
        })?;
    }

    let tmp = path.with_extension("tmp");
    let file = File::create(&tmp).map_err(|e| {
        HalError::PersistenceError(format!("failed to create {}: {e}", tmp.display()))
    })?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, &ENVELOPE_VERSION)
        .and_then(|()| bincode::serialize_into(&mut writer, stored))
        .map_err(|e| HalError::PersistenceError(format!("failed to serialize record: {e}")))?;
    writer
        .flush()
        .map_err(|e| HalError::PersistenceError(format!("failed to flush record: {e}")))?;
    drop(writer);

    fs::rename(&tmp, path).map_err(|e| {
        HalError::PersistenceError(format!("failed to replace {}: {e}", path.display()))
    })?;
    Ok(())
}

fn read_record(path: &Path) -> Result<Option<StoredRecord>, HalError> {
    if !path.exists() {
        debug!(path = %path.display(), "record file does not exist");
        return Ok(None);
    }

    let file = File::open(path).map_err(|e| {
        HalError::PersistenceError(format!("failed to open {}: {e}", path.display()))
    })?;
    let mut reader = BufReader::new(file);
    let version: u32 = bincode::deserialize_from(&mut reader)
        .map_err(|e| HalError::PersistenceError(format!("failed to read envelope: {e}")))?;
    if version != ENVELOPE_VERSION {
        warn!("record file version {version} differs from current {ENVELOPE_VERSION}, ignoring");
        return Ok(None);
    }

    let stored: StoredRecord = bincode::deserialize_from(&mut reader)
        .map_err(|e| HalError::PersistenceError(format!("failed to deserialize record: {e}")))?;
    if reader.bytes().next().is_some() {
        return Err(HalError::PersistenceError(
            "trailing bytes after record".to_string(),
        ));
    }
    Ok(Some(stored))
}

// ─── Non-volatile storage ───────────────────────────────────────────

/// Non-volatile record file.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the stored record.
    pub fn delete(&self) -> Result<(), HalError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                HalError::PersistenceError(format!("failed to delete record file: {e}"))
            })?;
            info!("deleted record file {:?}", self.path);
        }
        Ok(())
    }
}

impl NvStorage for FileStorage {
    fn load_record(&self) -> Result<Option<RetainedRecord>, HalError> {
        let stored = read_record(&self.path)?;
        if let Some(stored) = &stored {
            info!(
                "loaded record from {:?} (saved at {})",
                self.path, stored.saved_at
            );
        }
        Ok(stored.map(StoredRecord::into_record))
    }

    fn save_record(&self, record: &RetainedRecord) -> Result<(), HalError> {
        write_record(&self.path, record)?;
        info!(
            write_count = record.write_count,
            "saved record to {:?}", self.path
        );
        Ok(())
    }
}

// ─── Retained memory ────────────────────────────────────────────────

/// Reset-surviving image backed by a file.
///
/// An unreadable image is reported as empty: on hardware it would simply
/// hold garbage markers.
pub struct FileRetained {
    path: PathBuf,
}

impl FileRetained {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl RetainedMemory for FileRetained {
    fn read(&self) -> Result<Option<RetainedRecord>, HalError> {
        match read_record(&self.path) {
            Ok(stored) => Ok(stored.map(StoredRecord::into_record)),
            Err(e) => {
                warn!("retained image unreadable, treating as blank: {e}");
                Ok(None)
            }
        }
    }

    fn write(&self, record: &RetainedRecord) -> Result<(), HalError> {
        write_record(&self.path, record)
    }
}

// ─── In-memory ──────────────────────────────────────────────────────

/// In-process record slot implementing both storage traits.
///
/// An unavailable slot fails every operation, standing in for a flash
/// driver that does not respond.
#[derive(Default)]
pub struct MemoryStorage {
    record: Mutex<Option<RetainedRecord>>,
    unavailable: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: RetainedRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            record: Mutex::new(None),
            unavailable: true,
        }
    }

    /// Copy of the stored record.
    pub fn snapshot(&self) -> Option<RetainedRecord> {
        self.slot().clone()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<RetainedRecord>> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), HalError> {
        if self.unavailable {
            return Err(HalError::CommunicationError(
                "storage not responding".to_string(),
            ));
        }
        Ok(())
    }
}

impl NvStorage for MemoryStorage {
    fn load_record(&self) -> Result<Option<RetainedRecord>, HalError> {
        self.check_available()?;
        Ok(self.snapshot())
    }

    fn save_record(&self, record: &RetainedRecord) -> Result<(), HalError> {
        self.check_available()?;
        *self.slot() = Some(record.clone());
        Ok(())
    }
}

impl RetainedMemory for MemoryStorage {
    fn read(&self) -> Result<Option<RetainedRecord>, HalError> {
        self.load_record()
    }

    fn write(&self, record: &RetainedRecord) -> Result<(), HalError> {
        self.save_record(record)
    }
}
