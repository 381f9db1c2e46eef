// Integration tests for the snapshot store
// Covers the monotonic-version upsert and schema-version namespacing

mod common;

use common::setup_manager;
use strata_core::model::{Snapshot, SnapshotId, StreamId};

fn snapshot_id(schema_version: u32) -> SnapshotId {
    SnapshotId::new(StreamId::new("id", "streamType"), schema_version)
}

#[test]
fn test_schema_versions_stored_independently() {
    // Given: A tenant
    let (_dir, manager) = setup_manager();
    let store = manager.create("t1").unwrap();
    let snapshots = store.snapshots();

    // When: Two snapshots for the same stream differ only in schema version
    snapshots
        .save(&Snapshot::new(snapshot_id(1), 4, b"v1-state".to_vec()))
        .unwrap();
    snapshots
        .save(&Snapshot::new(snapshot_id(2), 7, b"v2-state".to_vec()))
        .unwrap();

    // Then: Each loads back unchanged
    let first = snapshots.load(&snapshot_id(1)).unwrap().unwrap();
    let second = snapshots.load(&snapshot_id(2)).unwrap().unwrap();
    assert_eq!((first.version, first.state), (4, b"v1-state".to_vec()));
    assert_eq!((second.version, second.state), (7, b"v2-state".to_vec()));
}

#[test]
fn test_older_version_is_silently_ignored() {
    // Given: A snapshot at version 10
    let (_dir, manager) = setup_manager();
    let store = manager.create("t1").unwrap();
    let snapshots = store.snapshots();
    snapshots
        .save(&Snapshot::new(snapshot_id(1), 10, b"new".to_vec()))
        .unwrap();

    // When: A snapshot built from version 3 is saved
    let result = snapshots.save(&Snapshot::new(snapshot_id(1), 3, b"old".to_vec()));

    // Then: The save succeeds but the stored snapshot is unchanged
    assert!(result.is_ok());
    let stored = snapshots.load(&snapshot_id(1)).unwrap().unwrap();
    assert_eq!(stored.version, 10);
    assert_eq!(stored.state, b"new".to_vec());
}

#[test]
fn test_newer_version_overwrites() {
    // Given: A snapshot at version 3
    let (_dir, manager) = setup_manager();
    let store = manager.create("t1").unwrap();
    let snapshots = store.snapshots();
    snapshots
        .save(&Snapshot::new(snapshot_id(1), 3, b"old".to_vec()))
        .unwrap();

    // When: A later snapshot is saved
    snapshots
        .save(&Snapshot::new(snapshot_id(1), 8, b"new".to_vec()))
        .unwrap();

    // Then: All fields are replaced
    assert_eq!(
        snapshots.load(&snapshot_id(1)).unwrap(),
        Some(Snapshot::new(snapshot_id(1), 8, b"new".to_vec()))
    );
}

#[test]
fn test_delete_then_load_is_absent() {
    // Given: A saved snapshot
    let (_dir, manager) = setup_manager();
    let store = manager.create("t1").unwrap();
    let snapshots = store.snapshots();
    snapshots
        .save(&Snapshot::new(snapshot_id(1), 1, b"s".to_vec()))
        .unwrap();

    // When: It is deleted twice
    snapshots.delete(&snapshot_id(1)).unwrap();
    snapshots.delete(&snapshot_id(1)).unwrap();

    // Then: Loading reports absence, not an error
    assert_eq!(snapshots.load(&snapshot_id(1)).unwrap(), None);
}

#[test]
fn test_snapshots_survive_reopen() {
    // Given: A snapshot saved before the manager is closed
    let (_dir, manager) = setup_manager();
    manager
        .create("t1")
        .unwrap()
        .snapshots()
        .save(&Snapshot::new(snapshot_id(1), 2, b"durable".to_vec()))
        .unwrap();
    manager.close().unwrap();

    // When: The tenant is opened again
    let store = manager.get_store("t1").unwrap();

    // Then: The snapshot is still there
    let stored = store.snapshots().load(&snapshot_id(1)).unwrap().unwrap();
    assert_eq!(stored.state, b"durable".to_vec());
}

#[test]
fn test_snapshots_with_separator_in_type_stay_apart() {
    // Given: Two distinct streams whose type and id would join into the same text
    let (_dir, manager) = setup_manager();
    let store = manager.create("t1").unwrap();
    let snapshots = store.snapshots();
    let left = SnapshotId::new(StreamId::new("b-c", "A"), 1);
    let right = SnapshotId::new(StreamId::new("c", "A-b"), 1);

    // When: Each saves a snapshot, the second at a lower version
    snapshots
        .save(&Snapshot::new(left.clone(), 9, b"left".to_vec()))
        .unwrap();
    snapshots
        .save(&Snapshot::new(right.clone(), 2, b"right".to_vec()))
        .unwrap();

    // Then: Neither overwrote or suppressed the other
    assert_eq!(snapshots.load(&left).unwrap().unwrap().state, b"left".to_vec());
    assert_eq!(snapshots.load(&right).unwrap().unwrap().state, b"right".to_vec());
}
