//! File-backed store behaviour

use std::sync::Arc;
use std::thread;

use dimscope_domain::repository::MeasurementRepository;
use dimscope_store::MeasurementStore;
use dimscope_types::{Error, MeasurementMethod, NewMeasurement};
use tempfile::tempdir;

fn new_record(owner: &str, name: &str) -> NewMeasurement {
    NewMeasurement {
        owner_id: owner.to_string(),
        object_name: name.to_string(),
        dimensions: "12.5 × 30".to_string(),
        method: MeasurementMethod::Camera,
        image_url: Some("data:image/jpeg;base64,AAAA".to_string()),
        confidence: Some(91),
        data: Some(serde_json::json!({"measurements": [], "selectedIndex": 0})),
    }
}

#[test]
fn test_records_survive_reopen() {
    let dir = tempdir().expect("Failed to create temp dir");

    let created = {
        let store = MeasurementStore::open(dir.path().to_path_buf()).unwrap();
        store.create(new_record("alice", "mug")).unwrap()
    };

    let store = MeasurementStore::open(dir.path().to_path_buf()).unwrap();
    let loaded = store.get(created.id).unwrap().expect("record should persist");
    assert_eq!(loaded, created);
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_deleted_ids_not_reused_across_reopen() {
    let dir = tempdir().expect("Failed to create temp dir");

    let deleted_id = {
        let store = MeasurementStore::open(dir.path().to_path_buf()).unwrap();
        store.create(new_record("alice", "a")).unwrap();
        let b = store.create(new_record("alice", "b")).unwrap();
        store.delete(b.id).unwrap();
        b.id
    };

    let store = MeasurementStore::open(dir.path().to_path_buf()).unwrap();
    let c = store.create(new_record("alice", "c")).unwrap();
    assert!(c.id > deleted_id);
}

#[test]
fn test_unusable_directory_is_storage_unavailable() {
    let dir = tempdir().expect("Failed to create temp dir");
    let file_path = dir.path().join("not-a-dir");
    std::fs::write(&file_path, b"occupied").unwrap();

    match MeasurementStore::open(file_path) {
        Err(Error::StorageUnavailable(_)) => {}
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("opening a store inside a file should fail"),
    }
}

#[test]
fn test_corrupt_file_is_storage_unavailable() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(dir.path().join("measurements.json"), b"{ not json").unwrap();

    assert!(matches!(
        MeasurementStore::open(dir.path().to_path_buf()),
        Err(Error::StorageUnavailable(_))
    ));
}

#[test]
fn test_concurrent_owners_do_not_mix() {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = Arc::new(MeasurementStore::open(dir.path().to_path_buf()).unwrap());

    let handles: Vec<_> = ["alice", "bob", "carol"]
        .into_iter()
        .map(|owner| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..10 {
                    store.create(new_record(owner, &format!("item-{}", i))).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    for owner in ["alice", "bob", "carol"] {
        let records = store.list_by_owner(owner).unwrap();
        assert_eq!(records.len(), 10);
        assert!(records.iter().all(|r| r.owner_id == owner));
    }

    let mut ids: Vec<_> = ["alice", "bob", "carol"]
        .iter()
        .flat_map(|o| store.list_by_owner(o).unwrap())
        .map(|r| r.id)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 30);
}
