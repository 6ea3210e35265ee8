//! Interpretation of raw detection service replies

use dimscope_types::{DetectionResult, MeasureResponse};
use log::warn;
use serde::Deserialize;

/// `GET /health` body; extra fields such as `model_loaded` are ignored
#[derive(Debug, Deserialize)]
struct HealthStatus {
    #[serde(default)]
    status: Option<String>,
}

/// `POST /measure` body before per-item validation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMeasureResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    measurements: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    annotated_image: Option<String>,
}

/// True only for a 2xx reply whose body reports `"status": "ok"`
pub fn interpret_health(status: u16, body: &[u8]) -> bool {
    if !(200..300).contains(&status) {
        return false;
    }
    serde_json::from_slice::<HealthStatus>(body)
        .map(|h| h.status.as_deref() == Some("ok"))
        .unwrap_or(false)
}

/// Turn a status code and body into a [`MeasureResponse`].
///
/// Non-2xx replies and unparseable bodies become failures. Individual
/// measurement entries that do not fit the schema are dropped with a warning
/// instead of failing the whole reply.
pub fn interpret_measure_response(status: u16, body: &[u8]) -> MeasureResponse {
    let parsed = serde_json::from_slice::<RawMeasureResponse>(body);

    if !(200..300).contains(&status) {
        let message = parsed
            .ok()
            .and_then(|raw| raw.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("Detection service returned status {}", status));
        return MeasureResponse::failure(message);
    }

    let raw = match parsed {
        Ok(raw) => raw,
        Err(e) => {
            return MeasureResponse::failure(format!(
                "Malformed response from detection service: {}",
                e
            ))
        }
    };

    let success = raw.success.unwrap_or(false);
    let message = raw.message.unwrap_or_default();

    if !success {
        let message = if message.trim().is_empty() {
            "Detection failed".to_string()
        } else {
            message
        };
        return MeasureResponse::failure(message);
    }

    let measurements: Vec<DetectionResult> = raw
        .measurements
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<DetectionResult>(item) {
            Ok(mut detection) => {
                detection.confidence = detection.confidence.clamp(0.0, 1.0);
                Some(detection)
            }
            Err(e) => {
                warn!("Skipping malformed detection entry: {}", e);
                None
            }
        })
        .collect();

    let message = if message.trim().is_empty() {
        format!("Detected {} objects", measurements.len())
    } else {
        message
    };

    MeasureResponse {
        success: true,
        message,
        measurements,
        annotated_image: raw.annotated_image.filter(|img| !img.is_empty()),
    }
}
