//! Adapters wiring config to the store and the detection client

use std::path::PathBuf;
use std::sync::Arc;

use dimscope_detect::HttpDetectionClient;
use dimscope_store::MeasurementStore;
use dimscope_types::Result;

use crate::config::Config;
use crate::records::RecordService;

/// Open the file-backed measurement store
pub fn open_store(config: &Config) -> Result<MeasurementStore> {
    MeasurementStore::open(config.store_dir()?)
}

/// Open the measurement store at a custom directory
pub fn open_store_at(store_dir: PathBuf) -> Result<MeasurementStore> {
    MeasurementStore::open(store_dir)
}

/// Record service over the configured store
pub fn open_record_service(config: &Config) -> Result<RecordService> {
    let store = open_store(config)?;
    Ok(RecordService::new(Arc::new(store), config.unit_suffix.clone()))
}

/// HTTP detection client from the configured URL and timeouts
pub fn open_detector(config: &Config) -> Result<HttpDetectionClient> {
    HttpDetectionClient::new(config.detector_config())
}
