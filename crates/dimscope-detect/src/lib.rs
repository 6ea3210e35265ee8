//! Detection module - client side of the external object detection service

pub mod client;
pub mod payload;
pub mod response;

pub use client::{DetectorConfig, HttpDetectionClient};
pub use payload::ImagePayload;
pub use response::{interpret_health, interpret_measure_response};

use async_trait::async_trait;
use dimscope_types::MeasureResponse;

/// Capability interface of the detection service.
///
/// Neither call raises: an unreachable or misbehaving service shows up as
/// `false` from [`check_health`](Self::check_health) and as a
/// `success = false` response from [`measure`](Self::measure).
#[async_trait]
pub trait DetectionClient: Send + Sync {
    /// Short, bounded probe; true only for an explicit "ok" status
    async fn check_health(&self) -> bool;

    /// Submit an image and return every detected object
    async fn measure(&self, image: &ImagePayload) -> MeasureResponse;
}
