//! Persistent store for measurement records

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dimscope_domain::repository::MeasurementRepository;
use dimscope_types::{Error, Measurement, MeasurementId, NewMeasurement, Result};
use log::{error, info};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

const STORE_FILE: &str = "measurements.json";

/// On-disk layout. Records are kept in insertion order.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreData {
    /// Next id to hand out; persisted so deleted ids are never reused
    next_id: MeasurementId,
    records: Vec<Measurement>,
}

impl StoreData {
    fn normalize(mut self) -> Self {
        let floor = self.records.iter().map(|r| r.id + 1).max().unwrap_or(1);
        self.next_id = self.next_id.max(floor);
        self
    }
}

/// Measurement store backed by a JSON file, or by memory alone
pub struct MeasurementStore {
    store_path: Option<PathBuf>,
    data: RwLock<StoreData>,
    clock: Arc<dyn Clock>,
}

fn unavailable(context: &str, err: impl std::fmt::Display) -> Error {
    Error::StorageUnavailable(format!("{}: {}", context, err))
}

impl MeasurementStore {
    /// Create or load a store in `store_dir`
    pub fn open(store_dir: PathBuf) -> Result<Self> {
        Self::open_with_clock(store_dir, Arc::new(SystemClock))
    }

    pub fn open_with_clock(store_dir: PathBuf, clock: Arc<dyn Clock>) -> Result<Self> {
        fs::create_dir_all(&store_dir)
            .map_err(|e| unavailable(&format!("cannot create {}", store_dir.display()), e))?;
        let store_path = store_dir.join(STORE_FILE);

        let data = if store_path.exists() {
            Self::load(&store_path)?
        } else {
            StoreData::default()
        };

        info!(
            "Opened measurement store at {} ({} records)",
            store_path.display(),
            data.records.len()
        );

        Ok(Self {
            store_path: Some(store_path),
            data: RwLock::new(data.normalize()),
            clock,
        })
    }

    /// Store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::in_memory_with_clock(Arc::new(SystemClock))
    }

    pub fn in_memory_with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            store_path: None,
            data: RwLock::new(StoreData::default().normalize()),
            clock,
        }
    }

    pub fn store_path(&self) -> Option<&Path> {
        self.store_path.as_deref()
    }

    /// Total records across all owners
    pub fn count(&self) -> Result<usize> {
        Ok(self.read()?.records.len())
    }

    fn load(path: &Path) -> Result<StoreData> {
        let file = File::open(path).map_err(|e| unavailable("cannot read store", e))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| unavailable(&format!("corrupt store {}", path.display()), e))
    }

    /// Save store to disk
    fn persist(&self, data: &StoreData) -> Result<()> {
        let Some(ref path) = self.store_path else {
            return Ok(());
        };
        replace_file(path, |writer| {
            serde_json::to_writer_pretty(writer, data)
                .map_err(|e| unavailable("cannot write store", e))
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreData>> {
        self.data.read().map_err(|e| unavailable("store lock poisoned", e))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreData>> {
        self.data.write().map_err(|e| unavailable("store lock poisoned", e))
    }
}

/// Write a sibling temp file and rename it over `path`.
/// On any failure the previous file is left as it was.
fn replace_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| unavailable("cannot write store", e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush().map_err(|e| unavailable("cannot write store", e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| unavailable("cannot write store", e))?;
    tmp.persist(path)
        .map_err(|e| unavailable("cannot replace store", e))?;
    Ok(())
}

impl MeasurementRepository for MeasurementStore {
    fn create(&self, record: NewMeasurement) -> Result<Measurement> {
        let mut data = self.write()?;

        let stored = Measurement {
            id: data.next_id,
            owner_id: record.owner_id,
            object_name: record.object_name,
            dimensions: record.dimensions,
            method: record.method,
            image_url: record.image_url,
            confidence: record.confidence,
            created_at: self.clock.now(),
            data: record.data,
        };

        data.next_id += 1;
        data.records.push(stored.clone());

        if let Err(e) = self.persist(&data) {
            data.records.pop();
            data.next_id -= 1;
            error!("Failed to persist measurement: {}", e);
            return Err(e);
        }

        info!(
            "Created measurement {} for owner {} ({})",
            stored.id, stored.owner_id, stored.object_name
        );
        Ok(stored)
    }

    fn get(&self, id: MeasurementId) -> Result<Option<Measurement>> {
        Ok(self.read()?.records.iter().find(|r| r.id == id).cloned())
    }

    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Measurement>> {
        let mut records: Vec<Measurement> = self
            .read()?
            .records
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();

        // stable: equal timestamps keep insertion order
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    fn delete(&self, id: MeasurementId) -> Result<()> {
        let mut data = self.write()?;

        let Some(index) = data.records.iter().position(|r| r.id == id) else {
            return Ok(());
        };

        let removed = data.records.remove(index);
        if let Err(e) = self.persist(&data) {
            data.records.insert(index, removed);
            error!("Failed to persist deletion of {}: {}", id, e);
            return Err(e);
        }

        info!("Deleted measurement {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use dimscope_types::MeasurementMethod;
    use tempfile::tempdir;

    fn new_record(owner: &str, name: &str) -> NewMeasurement {
        NewMeasurement {
            owner_id: owner.to_string(),
            object_name: name.to_string(),
            dimensions: "10 × 20".to_string(),
            method: MeasurementMethod::Upload,
            image_url: None,
            confidence: Some(80),
            data: None,
        }
    }

    fn manual_store() -> (MeasurementStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        (MeasurementStore::in_memory_with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_create_assigns_unique_ids() {
        let store = MeasurementStore::in_memory();
        let a = store.create(new_record("u1", "a")).unwrap();
        let b = store.create(new_record("u1", "b")).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.get(a.id).unwrap().unwrap().object_name, "a");
    }

    #[test]
    fn test_list_scoped_to_owner() {
        let store = MeasurementStore::in_memory();
        store.create(new_record("u1", "a")).unwrap();
        store.create(new_record("u2", "b")).unwrap();
        store.create(new_record("u1", "c")).unwrap();

        let listed = store.list_by_owner("u1").unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|r| r.owner_id == "u1"));
        assert!(store.list_by_owner("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_list_newest_first_with_stable_ties() {
        let (store, clock) = manual_store();
        let first = store.create(new_record("u1", "first")).unwrap();
        let tie = store.create(new_record("u1", "tie")).unwrap();
        clock.advance(Duration::minutes(5));
        let newest = store.create(new_record("u1", "newest")).unwrap();
        clock.set(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());
        let oldest = store.create(new_record("u1", "oldest")).unwrap();

        let ids: Vec<_> = store.list_by_owner("u1").unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![newest.id, first.id, tie.id, oldest.id]);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = MeasurementStore::in_memory();
        let a = store.create(new_record("u1", "a")).unwrap();

        store.delete(a.id).unwrap();
        store.delete(a.id).unwrap();
        store.delete(9999).unwrap();
        assert!(store.get(a.id).unwrap().is_none());
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let store = MeasurementStore::in_memory();
        let a = store.create(new_record("u1", "a")).unwrap();
        let b = store.create(new_record("u1", "b")).unwrap();
        store.delete(b.id).unwrap();
        let c = store.create(new_record("u1", "c")).unwrap();
        assert!(c.id > b.id);
        assert!(c.id > a.id);
    }

    #[test]
    fn test_created_at_comes_from_clock() {
        let (store, clock) = manual_store();
        let record = store.create(new_record("u1", "a")).unwrap();
        assert_eq!(record.created_at, clock.now());
    }

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STORE_FILE);
        fs::write(&path, r#"{"nextId":1,"records":[]}"#).unwrap();

        let result = replace_file(&path, |writer| {
            writer.write_all(b"{\"nextId\":")?;
            Err(Error::StorageUnavailable("disk full".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"nextId":1,"records":[]}"#);
        assert_eq!(entries(dir.path()), 1);
        assert!(MeasurementStore::open(dir.path().to_path_buf()).is_ok());
    }

    #[test]
    fn test_successful_write_replaces_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STORE_FILE);
        fs::write(&path, "old").unwrap();

        replace_file(&path, |writer| {
            writer.write_all(b"new")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(entries(dir.path()), 1);
    }
}
