//! Owner-scoped access to saved measurements

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dimscope_domain::repository::MeasurementRepository;
use dimscope_domain::service::{size_categories, summarize, validate_draft, width_distribution};
use dimscope_types::{
    Distribution, Error, Measurement, MeasurementDraft, MeasurementId, MeasurementStats, Result,
};
use log::{info, warn};

/// Every operation takes the acting user's id; records of other users are
/// never returned, changed, or counted.
#[derive(Clone)]
pub struct RecordService {
    repository: Arc<dyn MeasurementRepository>,
    unit: String,
}

impl RecordService {
    pub fn new(repository: Arc<dyn MeasurementRepository>, unit: impl Into<String>) -> Self {
        Self {
            repository,
            unit: unit.into(),
        }
    }

    pub fn repository(&self) -> Arc<dyn MeasurementRepository> {
        Arc::clone(&self.repository)
    }

    /// The user's records, newest first
    pub fn list(&self, owner_id: &str) -> Result<Vec<Measurement>> {
        self.repository.list_by_owner(owner_id)
    }

    /// Validate and store a new record for `owner_id`
    pub fn create(&self, owner_id: &str, draft: MeasurementDraft) -> Result<Measurement> {
        let new = validate_draft(owner_id, draft)?;
        self.repository.create(new)
    }

    /// Fetch a record, `NotFound` when absent and `Forbidden` when owned by someone else
    pub fn get_owned(&self, owner_id: &str, id: MeasurementId) -> Result<Measurement> {
        match self.repository.get(id)? {
            None => Err(Error::NotFound(id.to_string())),
            Some(record) if record.owner_id != owner_id => {
                warn!("{} tried to access measurement {} owned by another user", owner_id, id);
                Err(Error::Forbidden(format!("measurement {} belongs to another user", id)))
            }
            Some(record) => Ok(record),
        }
    }

    pub fn delete_owned(&self, owner_id: &str, id: MeasurementId) -> Result<()> {
        self.get_owned(owner_id, id)?;
        self.repository.delete(id)?;
        info!("{} deleted measurement {}", owner_id, id);
        Ok(())
    }

    pub fn stats(&self, owner_id: &str, now: DateTime<Utc>) -> Result<MeasurementStats> {
        let records = self.list(owner_id)?;
        Ok(summarize(&records, now, &self.unit))
    }

    pub fn distribution(&self, owner_id: &str) -> Result<Distribution> {
        let records = self.list(owner_id)?;
        Ok(Distribution {
            width_buckets: width_distribution(&records),
            size_categories: size_categories(&records),
        })
    }
}
