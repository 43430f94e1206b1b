//! Integration test: persisted record recovery across reboots.
//!
//! A "reboot" is a fresh unit assembled over the same storage backends.

use std::sync::Arc;

use brake_common::control::config::{CanBaud, FactoryDefaults};
use brake_common::control::retained::{RecordFields, RetainedRecord};
use brake_common::hal::driver::RetainedMemory;
use brake_control_unit::persist::recovery::recover;
use brake_hal::{FileRetained, FileStorage, MemoryStorage};
use tempfile::tempdir;

use super::fixtures::{Bench, unfiltered_config};

/// A fully valid record as written by an earlier firmware run.
fn stored_record() -> RetainedRecord {
    let config = unfiltered_config();
    let (mut record, _) = recover(
        None,
        &MemoryStorage::new(),
        &FactoryDefaults::default(),
        &config.hardware,
    );
    record.controller_id = 9;
    record.config.controller_id = 9;
    record.can_baud_rate = CanBaud::Baud250K;
    record.config.can_baud_rate = CanBaud::Baud250K;
    record.write_count = 7;
    record
}

#[test]
fn baud_marker_mismatch_reloads_from_storage() {
    let config = unfiltered_config();
    let stored = stored_record();

    let mut image = stored.clone();
    image.can_baud_rate_init_flag = 0;
    image.can_baud_rate = CanBaud::Baud10K;

    let retained = Arc::new(MemoryStorage::with_record(image));
    let nv = Arc::new(MemoryStorage::with_record(stored));
    let bench = Bench::with_storage(&config, retained.clone(), nv);

    let report = &bench.unit.recovery;
    assert_eq!(report.invalid, RecordFields::CAN_BAUD);
    assert!(report.reloaded);
    assert!(report.defaulted.is_empty());

    let record = bench.unit.persisted.record();
    assert_eq!(record.can_baud_rate, CanBaud::Baud250K);
    assert_eq!(record.controller_id, 9);
    assert_eq!(record.write_count, 7);
    assert!(
        record
            .invalid_fields(config.hardware.hw_config_init_flag())
            .is_empty()
    );
    assert_eq!(bench.unit.live.load().can_baud_rate, CanBaud::Baud250K);

    // Repaired image is written back.
    let written = retained.snapshot().expect("retained image written");
    assert_eq!(written.can_baud_rate, CanBaud::Baud250K);
}

#[test]
fn unavailable_storage_falls_back_to_defaults() {
    let config = unfiltered_config();
    let bench = Bench::with_storage(
        &config,
        Arc::new(MemoryStorage::new()),
        Arc::new(MemoryStorage::unavailable()),
    );

    let report = &bench.unit.recovery;
    assert_eq!(report.invalid, RecordFields::all());
    assert!(!report.reloaded);
    assert!(report.storage_error.is_some());
    assert_eq!(report.defaulted, RecordFields::all());

    let record = bench.unit.persisted.record();
    assert!(
        record
            .invalid_fields(config.hardware.hw_config_init_flag())
            .is_empty()
    );
    assert_eq!(record.can_baud_rate, CanBaud::Baud500K);
    assert_eq!(record.write_count, 0);
    assert_eq!(
        record.controller_id,
        config.defaults.controller_id(&config.hardware)
    );
    assert_eq!(bench.unit.live.load(), config.defaults.config(&config.hardware));
}

#[test]
fn stored_config_survives_power_loss() {
    let dir = tempdir().unwrap();
    let retained_path = dir.path().join("retained.bin");
    let nv_path = dir.path().join("nv").join("record.bin");
    let config = unfiltered_config();

    {
        let bench = Bench::with_storage(
            &config,
            Arc::new(FileRetained::new(&retained_path)),
            Arc::new(FileStorage::new(&nv_path)),
        );
        bench.set_limits(|cfg| {
            cfg.controller_id = 42;
            cfg.temp_lim_start = 55.0;
        });
        assert_eq!(bench.unit.authority.store_config().unwrap(), 1);
    }

    // Power loss clears retained memory.
    std::fs::remove_file(&retained_path).unwrap();

    let bench = Bench::with_storage(
        &config,
        Arc::new(FileRetained::new(&retained_path)),
        Arc::new(FileStorage::new(&nv_path)),
    );
    assert!(bench.unit.recovery.reloaded);
    let live = bench.unit.live.load();
    assert_eq!(live.controller_id, 42);
    assert_eq!(live.temp_lim_start, 55.0);
    assert_eq!(bench.unit.persisted.record().write_count, 1);
}

#[test]
fn warm_restart_keeps_retained_image() {
    let config = unfiltered_config();
    let retained = Arc::new(MemoryStorage::new());
    let nv = Arc::new(MemoryStorage::new());

    let first = Bench::with_storage(&config, retained.clone(), nv.clone());
    first.set_limits(|cfg| cfg.controller_id = 17);
    assert!(first.unit.persisted.mirror(&first.unit.live.load()).unwrap());
    assert!(!first.unit.persisted.mirror(&first.unit.live.load()).unwrap());
    drop(first);

    let second = Bench::with_storage(&config, retained, nv.clone());
    assert!(second.unit.recovery.clean());
    assert_eq!(second.unit.live.load().controller_id, 17);
    // Nothing was stored explicitly.
    assert!(nv.snapshot().is_none());
}

#[test]
fn usb_window_every_fourth_boot() {
    let config = unfiltered_config();
    let retained = Arc::new(MemoryStorage::new());
    let nv = Arc::new(MemoryStorage::new());

    let waits: Vec<bool> = (0..8)
        .map(|_| {
            let bench = Bench::with_storage(&config, retained.clone(), nv.clone());
            bench.unit.persisted.usb_boot_window().unwrap()
        })
        .collect();

    assert_eq!(
        waits,
        [false, false, false, true, false, false, false, true]
    );
    let record = retained.read().unwrap().unwrap();
    assert_eq!(record.boot_count, 0);
}
