//! Measurement orchestrator - capture, review and save workflow for one user
//!
//! State machine:
//!
//! ```text
//! Idle -> Capturing -> Detecting -> Reviewing -> Saving -> Idle
//!                          |            |           |
//!                          |            v           v
//!                          |          Idle      SaveFailed -> Saving (retry)
//!                          v                        |
//!                   DetectionFailed -> Idle         v
//!                                                 Idle
//! ```
//!
//! Only one capture is in flight at a time. A detection reply that arrives
//! after the capture was cancelled is dropped rather than applied.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dimscope_detect::{DetectionClient, ImagePayload};
use dimscope_domain::repository::MeasurementRepository;
use dimscope_types::{
    DetectionResult, Error, Measurement, MeasurementMethod, NewMeasurement,
};
use log::{debug, error, info, warn};
use serde_json::json;
use thiserror::Error;

/// Shown when the service succeeded but found nothing
pub const NO_OBJECTS_MESSAGE: &str = "No objects detected";

/// Errors specific to the orchestrator
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Cannot go from {from} to {to}")]
    InvalidTransition { from: StateKind, to: StateKind },

    #[error("Another operation is in progress ({0})")]
    Busy(StateKind),

    #[error("Capture was cancelled before detection finished")]
    Abandoned,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage unavailable: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl From<Error> for OrchestratorError {
    fn from(err: Error) -> Self {
        match err {
            Error::StorageUnavailable(msg) => OrchestratorError::Storage(msg),
            Error::InvalidImage(msg) => OrchestratorError::Validation(msg),
            Error::Validation(errors) => OrchestratorError::Validation(errors.to_string()),
            _ => OrchestratorError::Other(err.to_string()),
        }
    }
}

type ServiceResult<T> = std::result::Result<T, OrchestratorError>;

/// Discriminant of [`CaptureState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    Idle,
    Capturing,
    Detecting,
    Reviewing,
    DetectionFailed,
    Saving,
    SaveFailed,
}

impl StateKind {
    pub fn label(&self) -> &'static str {
        match self {
            StateKind::Idle => "idle",
            StateKind::Capturing => "capturing",
            StateKind::Detecting => "detecting",
            StateKind::Reviewing => "reviewing",
            StateKind::DetectionFailed => "detection failed",
            StateKind::Saving => "saving",
            StateKind::SaveFailed => "save failed",
        }
    }

    /// Edges of the state machine; anything else is rejected
    pub fn can_transition_to(self, next: StateKind) -> bool {
        use StateKind::*;
        matches!(
            (self, next),
            (Idle, Capturing)
                | (Capturing, Detecting)
                | (Detecting, Reviewing)
                | (Detecting, DetectionFailed)
                | (Detecting, Idle)
                | (Reviewing, Saving)
                | (Reviewing, Idle)
                | (DetectionFailed, Idle)
                | (Saving, Idle)
                | (Saving, SaveFailed)
                | (SaveFailed, Saving)
                | (SaveFailed, Idle)
        )
    }

    /// A request is outstanding in this state
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            StateKind::Capturing | StateKind::Detecting | StateKind::Saving
        )
    }
}

impl std::fmt::Display for StateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Detection results awaiting the user's decision
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub method: MeasurementMethod,
    pub image: ImagePayload,
    pub results: Vec<DetectionResult>,
    pub annotated_image: Option<String>,
    pub message: String,
}

impl Review {
    /// Image kept with a saved record: the annotated one when present
    pub fn display_image(&self) -> String {
        self.annotated_image
            .clone()
            .unwrap_or_else(|| self.image.to_data_url())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Capturing { method: MeasurementMethod },
    Detecting { method: MeasurementMethod },
    Reviewing(Review),
    DetectionFailed { message: String },
    Saving(Review),
    SaveFailed { review: Review, error: String },
}

impl CaptureState {
    pub fn kind(&self) -> StateKind {
        match self {
            CaptureState::Idle => StateKind::Idle,
            CaptureState::Capturing { .. } => StateKind::Capturing,
            CaptureState::Detecting { .. } => StateKind::Detecting,
            CaptureState::Reviewing(_) => StateKind::Reviewing,
            CaptureState::DetectionFailed { .. } => StateKind::DetectionFailed,
            CaptureState::Saving(_) => StateKind::Saving,
            CaptureState::SaveFailed { .. } => StateKind::SaveFailed,
        }
    }
}

/// What a finished capture produced
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Review(Review),
    Failed { message: String },
}

/// Options for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Keep the image with saved records
    pub save_images: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self { save_images: true }
    }
}

struct Inner {
    state: CaptureState,
    /// Bumped on every capture start and cancel; stale replies carry an old value
    generation: u64,
}

pub struct MeasurementOrchestrator {
    owner_id: String,
    detector: Arc<dyn DetectionClient>,
    repository: Arc<dyn MeasurementRepository>,
    options: OrchestratorOptions,
    inner: Arc<Mutex<Inner>>,
}

// every write leaves a complete state, so a poisoned lock is still usable
fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MeasurementOrchestrator {
    pub fn new(
        owner_id: impl Into<String>,
        detector: Arc<dyn DetectionClient>,
        repository: Arc<dyn MeasurementRepository>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            detector,
            repository,
            options: OrchestratorOptions::default(),
            inner: Arc::new(Mutex::new(Inner {
                state: CaptureState::Idle,
                generation: 0,
            })),
        }
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn state(&self) -> CaptureState {
        self.lock().state.clone()
    }

    pub fn kind(&self) -> StateKind {
        self.lock().state.kind()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }

    fn transition(inner: &mut Inner, next: CaptureState) -> ServiceResult<()> {
        let from = inner.state.kind();
        let to = next.kind();
        if !from.can_transition_to(to) {
            return Err(OrchestratorError::InvalidTransition { from, to });
        }
        debug!("Capture state: {} -> {}", from, to);
        inner.state = next;
        Ok(())
    }

    /// Send an image for detection and move to review (or failure).
    ///
    /// Rejected with `Busy` while another capture or a save is outstanding.
    /// Returns `Abandoned` if [`cancel`](Self::cancel) ran while the request
    /// was in flight; the late reply is then ignored.
    pub async fn capture(
        &self,
        image: ImagePayload,
        method: MeasurementMethod,
    ) -> ServiceResult<CaptureOutcome> {
        let generation = {
            let mut inner = self.lock();
            let current = inner.state.kind();
            if current.is_busy() {
                warn!("Capture rejected: {} in progress", current);
                return Err(OrchestratorError::Busy(current));
            }
            Self::transition(&mut inner, CaptureState::Capturing { method })?;
            Self::transition(&mut inner, CaptureState::Detecting { method })?;
            inner.generation += 1;
            inner.generation
        };

        info!(
            "Capture #{} for {} via {} ({} bytes)",
            generation,
            self.owner_id,
            method,
            image.len()
        );
        let response = self.detector.measure(&image).await;

        let mut inner = self.lock();
        if inner.generation != generation || inner.state.kind() != StateKind::Detecting {
            info!("Dropping detection reply for abandoned capture #{}", generation);
            return Err(OrchestratorError::Abandoned);
        }

        if response.has_results() {
            let review = Review {
                method,
                image,
                results: response.measurements,
                annotated_image: response.annotated_image,
                message: response.message,
            };
            Self::transition(&mut inner, CaptureState::Reviewing(review.clone()))?;
            Ok(CaptureOutcome::Review(review))
        } else {
            let message = if response.success {
                NO_OBJECTS_MESSAGE.to_string()
            } else {
                response.message
            };
            warn!("Capture #{} failed: {}", generation, message);
            Self::transition(
                &mut inner,
                CaptureState::DetectionFailed {
                    message: message.clone(),
                },
            )?;
            Ok(CaptureOutcome::Failed { message })
        }
    }

    /// Abandon the outstanding detection; its reply will be ignored
    pub fn cancel(&self) -> ServiceResult<()> {
        let mut inner = self.lock();
        Self::require(&inner, StateKind::Detecting, StateKind::Idle)?;
        Self::transition(&mut inner, CaptureState::Idle)?;
        info!("Capture #{} cancelled", inner.generation);
        inner.generation += 1;
        Ok(())
    }

    /// Drop the results under review without saving
    pub fn discard(&self) -> ServiceResult<()> {
        let mut inner = self.lock();
        Self::require(&inner, StateKind::Reviewing, StateKind::Idle)?;
        Self::transition(&mut inner, CaptureState::Idle)
    }

    /// Dismiss a detection or save failure
    pub fn acknowledge(&self) -> ServiceResult<()> {
        let mut inner = self.lock();
        let current = inner.state.kind();
        if !matches!(current, StateKind::DetectionFailed | StateKind::SaveFailed) {
            return Err(OrchestratorError::InvalidTransition {
                from: current,
                to: StateKind::Idle,
            });
        }
        Self::transition(&mut inner, CaptureState::Idle)
    }

    fn require(inner: &Inner, expected: StateKind, to: StateKind) -> ServiceResult<()> {
        let current = inner.state.kind();
        if current == expected {
            Ok(())
        } else if current.is_busy() {
            Err(OrchestratorError::Busy(current))
        } else {
            Err(OrchestratorError::InvalidTransition { from: current, to })
        }
    }

    /// Persist the selected result (first when `selection` is `None`).
    ///
    /// Allowed from review and, as a retry, after a failed save. On failure
    /// the review is kept so the user can try again. The write and the state
    /// change that follows it run in their own task, so dropping this future
    /// never leaves the orchestrator stuck in `Saving`.
    pub async fn save(&self, selection: Option<usize>) -> ServiceResult<Measurement> {
        let record = {
            let mut inner = self.lock();
            let review = match &inner.state {
                CaptureState::Reviewing(review) | CaptureState::SaveFailed { review, .. } => {
                    review.clone()
                }
                other if other.kind().is_busy() => {
                    return Err(OrchestratorError::Busy(other.kind()))
                }
                other => {
                    return Err(OrchestratorError::InvalidTransition {
                        from: other.kind(),
                        to: StateKind::Saving,
                    })
                }
            };

            let index = selection.unwrap_or(0);
            if index >= review.results.len() {
                return Err(OrchestratorError::Validation(format!(
                    "selection {} out of range ({} results)",
                    index,
                    review.results.len()
                )));
            }

            let record = self.build_record(&review, index);
            Self::transition(&mut inner, CaptureState::Saving(review))?;
            record
        };

        let repository = Arc::clone(&self.repository);
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = match tokio::task::spawn_blocking(move || repository.create(record)).await {
                Ok(result) => result,
                Err(e) => Err(Error::StorageUnavailable(format!("save task failed: {}", e))),
            };
            Self::finish_save(&inner, result)
        });

        match task.await {
            Ok(result) => result,
            Err(e) => Err(OrchestratorError::Storage(format!("save task failed: {}", e))),
        }
    }

    fn finish_save(
        inner: &Mutex<Inner>,
        result: dimscope_types::Result<Measurement>,
    ) -> ServiceResult<Measurement> {
        let mut inner = lock_inner(inner);
        let review = match &inner.state {
            CaptureState::Saving(review) => review.clone(),
            other => {
                return Err(OrchestratorError::InvalidTransition {
                    from: other.kind(),
                    to: StateKind::Idle,
                })
            }
        };

        match result {
            Ok(saved) => {
                info!("Saved measurement {} for {}", saved.id, saved.owner_id);
                Self::transition(&mut inner, CaptureState::Idle)?;
                Ok(saved)
            }
            Err(e) => {
                error!("Saving measurement failed: {}", e);
                Self::transition(
                    &mut inner,
                    CaptureState::SaveFailed {
                        review,
                        error: e.to_string(),
                    },
                )?;
                Err(e.into())
            }
        }
    }

    fn build_record(&self, review: &Review, index: usize) -> NewMeasurement {
        let chosen = &review.results[index];
        let image_url = if self.options.save_images {
            Some(review.display_image())
        } else {
            None
        };

        NewMeasurement {
            owner_id: self.owner_id.clone(),
            object_name: chosen.object_name.clone(),
            dimensions: chosen.dimensions.clone(),
            method: review.method,
            image_url,
            confidence: Some(chosen.confidence_percent()),
            data: Some(json!({
                "measurements": review.results,
                "selectedIndex": index,
            })),
        }
    }
}
