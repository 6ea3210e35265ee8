//! Measurement records and detection service payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize null as default value
fn null_to_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::deserialize(deserializer).map(|opt| opt.unwrap_or_default())
}

/// Record identifier, assigned by the store and never reused
pub type MeasurementId = u64;

/// Where the source image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementMethod {
    Upload,
    Camera,
}

impl MeasurementMethod {
    pub fn label(&self) -> &'static str {
        match self {
            MeasurementMethod::Upload => "upload",
            MeasurementMethod::Camera => "camera",
        }
    }

    /// Case-insensitive parse of a wire tag
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "upload" => Some(MeasurementMethod::Upload),
            "camera" => Some(MeasurementMethod::Camera),
            _ => None,
        }
    }
}

impl std::fmt::Display for MeasurementMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Axis-aligned box in source-image pixel coordinates.
///
/// On the wire this is the array `[x1, y1, x2, y2]`. Corners are normalised on
/// construction so that `x1 <= x2` and `y1 <= y2` always hold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(c: [f64; 4]) -> Self {
        Self::from_corners(c[0], c[1], c[2], c[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One candidate object returned by the detection service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    #[serde(default, deserialize_with = "null_to_default")]
    pub object_name: String,

    /// Free-form extents, e.g. "12.5 × 30.0"
    #[serde(default, deserialize_with = "null_to_default")]
    pub dimensions: String,

    /// Service confidence in [0, 1]
    #[serde(default, deserialize_with = "null_to_default")]
    pub confidence: f64,

    #[serde(rename = "bbox")]
    pub bounding_box: BoundingBox,
}

impl DetectionResult {
    /// Confidence as an integer percentage clamped to [0, 100]
    pub fn confidence_percent(&self) -> u8 {
        let pct = (self.confidence * 100.0).round();
        if pct.is_nan() {
            0
        } else {
            pct.clamp(0.0, 100.0) as u8
        }
    }
}

/// Outcome of a measure call; failures are values, never errors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureResponse {
    #[serde(default, deserialize_with = "null_to_default")]
    pub success: bool,

    #[serde(default, deserialize_with = "null_to_default")]
    pub message: String,

    #[serde(default, deserialize_with = "null_to_default")]
    pub measurements: Vec<DetectionResult>,

    /// Encoded annotated image (data URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated_image: Option<String>,
}

impl MeasureResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            measurements: Vec::new(),
            annotated_image: None,
        }
    }

    /// Success with at least one result
    pub fn has_results(&self) -> bool {
        self.success && !self.measurements.is_empty()
    }
}

/// Persistent measurement record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub id: MeasurementId,
    pub owner_id: String,
    pub object_name: String,
    pub dimensions: String,
    pub method: MeasurementMethod,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Integer percentage
    #[serde(default)]
    pub confidence: Option<u8>,
    pub created_at: DateTime<Utc>,
    /// Full detection result set captured alongside the chosen result
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl Measurement {
    /// Whether a non-empty image reference was saved
    pub fn has_image(&self) -> bool {
        self.image_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    /// All candidate detections stored in `data`, if it holds any
    pub fn detections(&self) -> Option<Vec<DetectionResult>> {
        let data = self.data.as_ref()?;
        let list = data.get("measurements")?;
        serde_json::from_value(list.clone()).ok()
    }
}

/// Validated input for a new record; id and timestamp are assigned by the store
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeasurement {
    pub owner_id: String,
    pub object_name: String,
    pub dimensions: String,
    pub method: MeasurementMethod,
    pub image_url: Option<String>,
    pub confidence: Option<u8>,
    pub data: Option<serde_json::Value>,
}

/// Unvalidated create request as sent by a client.
///
/// Any `ownerId` in the body is ignored; the owner always comes from the
/// authenticated caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementDraft {
    #[serde(default)]
    pub object_name: Option<String>,
    #[serde(default)]
    pub dimensions: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Summary counters shown on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementStats {
    pub total_measurements: usize,
    pub recent_measurements: usize,
    pub saved_images: usize,
    /// Formatted average of the second dimension component, or "N/A"
    pub avg_size: String,
}

/// Count of records whose width falls in `[range_start, range_end)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionBucket {
    pub range_start: i64,
    pub range_end: i64,
    pub label: String,
    pub count: usize,
}

/// Size class of a record, judged on its second dimension component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SizeCategory {
    Small,
    Medium,
    Large,
    Unknown,
}

impl SizeCategory {
    /// Small below 10, Medium 10 to 30 inclusive, Large above 30
    pub fn from_height(height: f64) -> Self {
        match height {
            h if h < 10.0 => SizeCategory::Small,
            h if h <= 30.0 => SizeCategory::Medium,
            h if h > 30.0 => SizeCategory::Large,
            _ => SizeCategory::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SizeCategory::Small => "Small",
            SizeCategory::Medium => "Medium",
            SizeCategory::Large => "Large",
            SizeCategory::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeCategoryCounts {
    #[serde(rename = "Small")]
    pub small: usize,
    #[serde(rename = "Medium")]
    pub medium: usize,
    #[serde(rename = "Large")]
    pub large: usize,
    #[serde(rename = "Unknown")]
    pub unknown: usize,
}

impl SizeCategoryCounts {
    pub fn add(&mut self, category: SizeCategory) {
        match category {
            SizeCategory::Small => self.small += 1,
            SizeCategory::Medium => self.medium += 1,
            SizeCategory::Large => self.large += 1,
            SizeCategory::Unknown => self.unknown += 1,
        }
    }

    pub fn get(&self, category: SizeCategory) -> usize {
        match category {
            SizeCategory::Small => self.small,
            SizeCategory::Medium => self.medium,
            SizeCategory::Large => self.large,
            SizeCategory::Unknown => self.unknown,
        }
    }
}

/// Chart data derived from a user's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub width_buckets: Vec<DistributionBucket>,
    pub size_categories: SizeCategoryCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_result_wire_format() {
        let json = r#"{"objectName":"cup","dimensions":"8 × 10","confidence":0.876,"bbox":[120,40,20,90]}"#;
        let result: DetectionResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.object_name, "cup");
        assert_eq!(result.confidence_percent(), 88);
        // corners arrive swapped on x and are normalised
        assert_eq!(result.bounding_box.x1, 20.0);
        assert_eq!(result.bounding_box.x2, 120.0);
        assert_eq!(result.bounding_box.width(), 100.0);
    }

    #[test]
    fn test_confidence_percent_clamps() {
        let mut result = DetectionResult {
            object_name: "x".to_string(),
            dimensions: String::new(),
            confidence: 1.7,
            bounding_box: BoundingBox::from_corners(0.0, 0.0, 1.0, 1.0),
        };
        assert_eq!(result.confidence_percent(), 100);
        result.confidence = -0.2;
        assert_eq!(result.confidence_percent(), 0);
    }

    #[test]
    fn test_measure_response_null_fields() {
        let json = r#"{"success":false,"message":null,"measurements":null}"#;
        let response: MeasureResponse = serde_json::from_str(json).unwrap();
        assert!(!response.success);
        assert!(response.message.is_empty());
        assert!(response.measurements.is_empty());
        assert!(!response.has_results());
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(MeasurementMethod::parse("Camera"), Some(MeasurementMethod::Camera));
        assert_eq!(MeasurementMethod::parse(" upload "), Some(MeasurementMethod::Upload));
        assert_eq!(MeasurementMethod::parse("scanner"), None);
    }

    #[test]
    fn test_measurement_detections_from_data() {
        let record = Measurement {
            id: 1,
            owner_id: "u1".to_string(),
            object_name: "cup".to_string(),
            dimensions: "8 × 10".to_string(),
            method: MeasurementMethod::Upload,
            image_url: Some(String::new()),
            confidence: Some(90),
            created_at: Utc::now(),
            data: Some(serde_json::json!({
                "measurements": [
                    {"objectName":"cup","dimensions":"8 × 10","confidence":0.9,"bbox":[0,0,10,10]},
                    {"objectName":"book","dimensions":"15 × 22","confidence":0.4,"bbox":[5,5,50,60]}
                ],
                "selectedIndex": 0
            })),
        };
        let detections = record.detections().unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[1].object_name, "book");
        assert!(!record.has_image());
    }
}
