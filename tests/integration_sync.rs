//! Integration tests for the sync engine.
//!
//! These tests verify end-to-end backup behavior including:
//! - Mirror layout across volumes and albums
//! - Copy-once semantics across runs sharing one ledger
//! - Containment of per-file and per-album failures

use assert_fs::prelude::*;
use media_mirror::core::device::{
    InMemoryDevice, LocalMountDevice, MediaType, VolumeAttributes, VolumeInfo, VolumeRef,
};
use media_mirror::core::store::{FetchKey, FetchStore, SqliteStore};
use media_mirror::core::sync::SyncEngine;
use media_mirror::events::{Event, EventChannel, FetchEvent, SyncEvent, VolumeEvent};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn internal() -> VolumeInfo {
    VolumeInfo {
        media_type: MediaType::INTERNAL,
        slot: 0,
        attributes: VolumeAttributes::empty(),
    }
}

fn sd_card(slot: u32) -> VolumeInfo {
    VolumeInfo {
        media_type: MediaType::SD_CARD,
        slot,
        attributes: VolumeAttributes::SLOT_BASED,
    }
}

fn engine_for(mirror: &Path) -> SyncEngine {
    SyncEngine::builder()
        .local_root(mirror.to_path_buf())
        .build()
}

fn engine_with_ledger(mirror: &Path, ledger: &Path) -> SyncEngine {
    SyncEngine::builder()
        .local_root(mirror.to_path_buf())
        .store(Box::new(SqliteStore::open(ledger).unwrap()))
        .build()
}

#[test]
fn fresh_run_mirrors_albums_by_volume_and_album() {
    let mut device = InMemoryDevice::new();
    let phone = device.add_volume(internal());
    let card = device.add_volume(sd_card(1));
    device.add_file(phone, "/DCIM/Vacation/a.jpg", vec![0xAA; 64]);
    device.add_file(phone, "/DCIM/Vacation/notes.txt", b"not media".to_vec());
    device.add_file(card, "/DCIM/Work/c.3gp", vec![0xBB; 32]);

    let mirror = TempDir::new().unwrap();
    let report = engine_for(mirror.path()).run(&device).unwrap();

    assert!(report.found_data());
    assert_eq!(report.files_copied(), 2);
    assert_eq!(report.files_failed(), 0);
    assert!(report.fully_succeeded());

    assert_eq!(
        fs::read(mirror.path().join("Device/Vacation/a.jpg")).unwrap(),
        vec![0xAA; 64]
    );
    assert!(mirror.path().join("SDCard/Work/c.3gp").exists());
    assert!(!mirror.path().join("Device/Vacation/notes.txt").exists());
}

#[test]
fn second_run_with_the_same_ledger_skips_everything() {
    let mut device = InMemoryDevice::new();
    let vol = device.add_volume(internal());
    device.add_file(vol, "/DCIM/Vacation/a.jpg", vec![1; 100]);
    device.add_file(vol, "/DCIM/Vacation/b.3g2", vec![2; 200]);

    let mirror = TempDir::new().unwrap();
    let ledger_dir = TempDir::new().unwrap();
    let ledger = ledger_dir.path().join("fetched.db");

    let first = engine_with_ledger(mirror.path(), &ledger)
        .run(&device)
        .unwrap();
    assert_eq!(first.files_copied(), 2);
    assert_eq!(first.files_skipped(), 0);

    let second = engine_with_ledger(mirror.path(), &ledger)
        .run(&device)
        .unwrap();
    assert_eq!(second.files_copied(), 0);
    assert_eq!(second.files_skipped(), 2);
    assert!(second.found_data());
}

#[test]
fn a_resized_file_is_fetched_again() {
    let mut device = InMemoryDevice::new();
    let vol = device.add_volume(internal());
    device.add_file(vol, "/DCIM/Vacation/a.jpg", vec![1; 100]);

    let mirror = TempDir::new().unwrap();
    let ledger_dir = TempDir::new().unwrap();
    let ledger = ledger_dir.path().join("fetched.db");

    let first = engine_with_ledger(mirror.path(), &ledger)
        .run(&device)
        .unwrap();
    assert_eq!(first.files_copied(), 1);

    // Same name, new size: a different identity, so it is copied again
    device.add_file(vol, "/DCIM/Vacation/a.jpg", vec![9; 150]);

    let second = engine_with_ledger(mirror.path(), &ledger)
        .run(&device)
        .unwrap();
    assert_eq!(second.files_copied(), 1);
    assert_eq!(second.files_skipped(), 0);
    assert_eq!(
        fs::read(mirror.path().join("Device/Vacation/a.jpg")).unwrap(),
        vec![9; 150]
    );

    // The old identity stays behind in the ledger
    let store = SqliteStore::open(&ledger).unwrap();
    assert!(store.contains(&FetchKey::new("a.jpg", 100)).unwrap());
    assert!(store.contains(&FetchKey::new("a.jpg", 150)).unwrap());
    assert_eq!(store.stats().unwrap().total_entries, 2);
}

#[test]
fn a_file_that_moved_to_another_album_is_not_copied_again() {
    let mut device = InMemoryDevice::new();
    let vol = device.add_volume(internal());
    device.add_file(vol, "/DCIM/Vacation/a.jpg", vec![1; 1000]);

    let mirror = TempDir::new().unwrap();
    let ledger_dir = TempDir::new().unwrap();
    let ledger = ledger_dir.path().join("fetched.db");

    let first = engine_with_ledger(mirror.path(), &ledger)
        .run(&device)
        .unwrap();
    assert_eq!(first.files_copied(), 1);

    // The user refiles the photo on the device between runs
    let mut moved = InMemoryDevice::new();
    let vol = moved.add_volume(internal());
    moved.add_file(vol, "/DCIM/Work/a.jpg", vec![1; 1000]);

    let second = engine_with_ledger(mirror.path(), &ledger)
        .run(&moved)
        .unwrap();

    // Same name, same size: the identity is already in the ledger
    assert_eq!(second.files_copied(), 0);
    assert_eq!(second.files_skipped(), 1);
    assert!(!mirror.path().join("Device/Work/a.jpg").exists());
    assert!(mirror.path().join("Device/Vacation/a.jpg").exists());

    let store = SqliteStore::open(&ledger).unwrap();
    assert_eq!(store.stats().unwrap().total_entries, 1);
}

#[test]
fn a_hidden_first_volume_contributes_files() {
    let mut device = InMemoryDevice::new();
    let listed = device.add_volume(sd_card(1));
    device.add_file(listed, "/DCIM/Work/w.jpg", vec![3; 10]);
    device.add_unlisted_volume(
        VolumeRef(1),
        VolumeInfo {
            media_type: MediaType::INTERNAL,
            slot: 0,
            attributes: VolumeAttributes::HIDDEN,
        },
    );
    device.add_file(VolumeRef(1), "/DCIM/Private/p.jpg", vec![4; 10]);

    let mirror = TempDir::new().unwrap();
    let report = engine_for(mirror.path()).run(&device).unwrap();

    assert_eq!(report.volumes, 2);
    assert_eq!(report.files_copied(), 2);
    assert!(mirror.path().join("Device/Private/p.jpg").exists());
    assert!(mirror.path().join("SDCard/Work/w.jpg").exists());
}

#[test]
fn disabling_the_probe_skips_the_hidden_volume() {
    let mut device = InMemoryDevice::new();
    let listed = device.add_volume(sd_card(1));
    device.add_file(listed, "/DCIM/Work/w.jpg", vec![3; 10]);
    device.add_unlisted_volume(
        VolumeRef(1),
        VolumeInfo {
            media_type: MediaType::INTERNAL,
            slot: 0,
            attributes: VolumeAttributes::HIDDEN,
        },
    );
    device.add_file(VolumeRef(1), "/DCIM/Private/p.jpg", vec![4; 10]);

    let mirror = TempDir::new().unwrap();
    let report = SyncEngine::builder()
        .local_root(mirror.path().to_path_buf())
        .probe_hidden_volume(false)
        .build()
        .run(&device)
        .unwrap();

    assert_eq!(report.volumes, 1);
    assert_eq!(report.files_copied(), 1);
    assert!(!mirror.path().join("Device").exists());
}

#[test]
fn a_failed_copy_leaves_no_partial_file_and_is_retried_next_run() {
    let mut device = InMemoryDevice::new();
    let vol = device.add_volume(internal());
    device.add_file(vol, "/DCIM/Trip/bad.jpg", vec![7; 100]);
    device.add_file(vol, "/DCIM/Trip/good.jpg", vec![8; 50]);
    device.fail_read_after(vol, "/DCIM/Trip/bad.jpg", 10);

    let mirror = TempDir::new().unwrap();
    let ledger_dir = TempDir::new().unwrap();
    let ledger = ledger_dir.path().join("fetched.db");

    let first = engine_with_ledger(mirror.path(), &ledger)
        .run(&device)
        .unwrap();

    assert_eq!(first.files_copied(), 1);
    assert_eq!(first.files_failed(), 1);
    assert!(!first.fully_succeeded());
    assert!(!mirror.path().join("Device/Trip/bad.jpg").exists());
    assert!(mirror.path().join("Device/Trip/good.jpg").exists());

    // The failed file never made it into the ledger, so a healthy run picks it up
    let mut healthy = InMemoryDevice::new();
    let vol = healthy.add_volume(internal());
    healthy.add_file(vol, "/DCIM/Trip/bad.jpg", vec![7; 100]);
    healthy.add_file(vol, "/DCIM/Trip/good.jpg", vec![8; 50]);

    let second = engine_with_ledger(mirror.path(), &ledger)
        .run(&healthy)
        .unwrap();

    assert_eq!(second.files_copied(), 1);
    assert_eq!(second.files_skipped(), 1);
    assert_eq!(
        fs::read(mirror.path().join("Device/Trip/bad.jpg")).unwrap(),
        vec![7; 100]
    );
}

#[test]
fn thumbnails_hidden_files_and_foreign_extensions_are_ignored() {
    let mut device = InMemoryDevice::new();
    let vol = device.add_volume(internal());
    device.add_file(vol, "/DCIM/#Thumbnail/t.jpg", vec![1; 10]);
    device.add_file(vol, "/DCIM/Vacation/a.jpg", vec![2; 10]);
    device.add_file_with_attributes(
        vol,
        "/DCIM/Vacation/h.jpg",
        vec![3; 10],
        media_mirror::core::device::FileAttributes::HIDDEN,
    );
    // A loose file directly under the root belongs to the unfiled album
    device.add_file(vol, "/DCIM/loose.amr", vec![4; 10]);

    let mirror = TempDir::new().unwrap();
    let report = engine_for(mirror.path()).run(&device).unwrap();

    assert_eq!(report.files_copied(), 2);
    assert!(mirror.path().join("Device/Vacation/a.jpg").exists());
    assert!(mirror.path().join("Device/loose.amr").exists());
    assert!(!mirror.path().join("Device/#Thumbnail").exists());
    assert!(!mirror.path().join("Device/Vacation/h.jpg").exists());
}

#[test]
fn volumes_without_media_roots_do_not_abort_the_run() {
    let mut device = InMemoryDevice::new();
    device.add_volume(internal());
    let card = device.add_volume(sd_card(1));
    device.add_file(card, "/Photos & Videos/Clips/v.3g2", vec![5; 20]);

    let mirror = TempDir::new().unwrap();
    let report = engine_for(mirror.path()).run(&device).unwrap();

    assert_eq!(report.volumes, 2);
    assert_eq!(report.files_copied(), 1);
    assert!(report.errors.is_empty());
    assert!(mirror.path().join("SDCard/Clips/v.3g2").exists());
}

#[test]
fn local_mounts_are_mirrored_end_to_end() {
    let mount = assert_fs::TempDir::new().unwrap();
    mount
        .child("DCIM/Holiday/photo.jpg")
        .write_binary(&[0x11; 40])
        .unwrap();
    mount
        .child("DCIM/Holiday/.skipme.jpg")
        .write_binary(&[0x22; 8])
        .unwrap();
    mount
        .child("DCIM/Holiday/readme.txt")
        .write_str("not media")
        .unwrap();

    let device = LocalMountDevice::from_mounts(&[mount.path()]);

    let mirror = assert_fs::TempDir::new().unwrap();
    let report = engine_for(mirror.path()).run(&device).unwrap();

    assert_eq!(report.files_copied(), 1);
    mirror
        .child("SDCard/Holiday/photo.jpg")
        .assert(predicate::path::exists());
    mirror
        .child("SDCard/Holiday/.skipme.jpg")
        .assert(predicate::path::missing());
    mirror
        .child("SDCard/Holiday/readme.txt")
        .assert(predicate::path::missing());
    assert_eq!(
        fs::read(mirror.child("SDCard/Holiday/photo.jpg").path()).unwrap(),
        vec![0x11; 40]
    );
}

#[test]
fn events_trace_the_run_from_start_to_completion() {
    let mut device = InMemoryDevice::new();
    let vol = device.add_volume(internal());
    device.add_file(vol, "/DCIM/Vacation/a.jpg", vec![6; 30]);

    let mirror = TempDir::new().unwrap();
    let (sender, receiver) = EventChannel::new();

    let report = engine_for(mirror.path())
        .run_with_events(&device, &sender)
        .unwrap();
    drop(sender);

    let events: Vec<Event> = receiver.iter().collect();

    assert!(matches!(
        events.first(),
        Some(Event::Sync(SyncEvent::Started { .. }))
    ));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::Volume(VolumeEvent::Found { .. }))));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::Fetch(FetchEvent::FileCopied { .. }))));
    match events.last() {
        Some(Event::Sync(SyncEvent::Completed { summary })) => {
            assert_eq!(summary.files_copied, 1);
            assert_eq!(summary.files_copied, report.files_copied());
        }
        other => panic!("expected a completion event, got {:?}", other),
    }
}
