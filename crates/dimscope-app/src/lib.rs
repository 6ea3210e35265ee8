//! Application service layer - capture orchestration, config, records, export

pub mod config;
pub mod export;
pub mod orchestrator;
pub mod records;
pub mod repository;
pub mod scanner;

pub use config::Config;
pub use orchestrator::{
    CaptureOutcome, CaptureState, MeasurementOrchestrator, OrchestratorError, OrchestratorOptions,
    Review, StateKind,
};
pub use records::RecordService;
