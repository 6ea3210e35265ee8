//! Repository trait definitions for data persistence

use dimscope_types::Result;
use dimscope_types::{Measurement, MeasurementId, NewMeasurement};

/// Store of measurement records.
///
/// Storage failures are `Error::StorageUnavailable`; a missing record is
/// `Ok(None)` and never an error.
pub trait MeasurementRepository: Send + Sync {
    /// Assign id and timestamp, persist, and return the stored record
    fn create(&self, record: NewMeasurement) -> Result<Measurement>;

    /// Find a record by id regardless of owner
    fn get(&self, id: MeasurementId) -> Result<Option<Measurement>>;

    /// All records of one owner, newest first
    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Measurement>>;

    /// Remove a record; removing an absent id succeeds
    fn delete(&self, id: MeasurementId) -> Result<()>;
}
