//! Validation of client-supplied create requests

use dimscope_types::{MeasurementDraft, MeasurementMethod, NewMeasurement, Result, ValidationErrors};

pub const MAX_OBJECT_NAME_LEN: usize = 200;
pub const MAX_DIMENSIONS_LEN: usize = 100;

/// Check a draft and bind it to `owner_id`.
///
/// All field problems are collected before returning. `dimensions` is only
/// required to be present; its format is not enforced here because readers
/// are parse-tolerant and older records do not follow a strict form.
pub fn validate_draft(owner_id: &str, draft: MeasurementDraft) -> Result<NewMeasurement> {
    let mut errors = ValidationErrors::new();

    if owner_id.trim().is_empty() {
        errors.push("ownerId", "is required");
    }

    let object_name = draft.object_name.unwrap_or_default().trim().to_string();
    if object_name.is_empty() {
        errors.push("objectName", "is required");
    } else if object_name.chars().count() > MAX_OBJECT_NAME_LEN {
        errors.push(
            "objectName",
            format!("must be at most {} characters", MAX_OBJECT_NAME_LEN),
        );
    }

    let dimensions = draft.dimensions.unwrap_or_default().trim().to_string();
    if dimensions.is_empty() {
        errors.push("dimensions", "is required");
    } else if dimensions.chars().count() > MAX_DIMENSIONS_LEN {
        errors.push(
            "dimensions",
            format!("must be at most {} characters", MAX_DIMENSIONS_LEN),
        );
    }

    let method = match draft.method.as_deref() {
        None => {
            errors.push("method", "is required");
            None
        }
        Some(raw) => {
            let parsed = MeasurementMethod::parse(raw);
            if parsed.is_none() {
                errors.push("method", "must be one of: upload, camera");
            }
            parsed
        }
    };

    let confidence = match draft.confidence {
        None => None,
        Some(value) if value.is_finite() && (0.0..=100.0).contains(&value) => {
            Some(value.round() as u8)
        }
        Some(_) => {
            errors.push("confidence", "must be between 0 and 100");
            None
        }
    };

    let image_url = draft.image_url.filter(|url| !url.trim().is_empty());

    match method {
        Some(method) => errors.into_result(NewMeasurement {
            owner_id: owner_id.to_string(),
            object_name,
            dimensions,
            method,
            image_url,
            confidence,
            data: draft.data,
        }),
        // method error already recorded
        None => Err(errors.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dimscope_types::Error;

    fn draft() -> MeasurementDraft {
        MeasurementDraft {
            object_name: Some("cup".to_string()),
            dimensions: Some("8 × 10".to_string()),
            method: Some("camera".to_string()),
            image_url: None,
            confidence: Some(87.4),
            data: None,
        }
    }

    fn field_names(err: Error) -> Vec<String> {
        match err {
            Error::Validation(list) => list.iter().map(|e| e.field.clone()).collect(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_draft() {
        let record = validate_draft("user-1", draft()).unwrap();
        assert_eq!(record.owner_id, "user-1");
        assert_eq!(record.method, MeasurementMethod::Camera);
        assert_eq!(record.confidence, Some(87));
    }

    #[test]
    fn test_collects_every_field_error() {
        let bad = MeasurementDraft {
            object_name: Some("   ".to_string()),
            dimensions: None,
            method: Some("scanner".to_string()),
            image_url: None,
            confidence: Some(140.0),
            data: None,
        };
        let fields = field_names(validate_draft("user-1", bad).unwrap_err());
        assert_eq!(fields, vec!["objectName", "dimensions", "method", "confidence"]);
    }

    #[test]
    fn test_missing_method() {
        let mut d = draft();
        d.method = None;
        assert_eq!(field_names(validate_draft("u", d).unwrap_err()), vec!["method"]);
    }

    #[test]
    fn test_malformed_dimensions_are_accepted() {
        let mut d = draft();
        d.dimensions = Some("about a hand".to_string());
        assert!(validate_draft("u", d).is_ok());
    }

    #[test]
    fn test_blank_image_url_dropped() {
        let mut d = draft();
        d.image_url = Some("  ".to_string());
        assert_eq!(validate_draft("u", d).unwrap().image_url, None);
    }

    #[test]
    fn test_blank_owner_rejected() {
        assert_eq!(field_names(validate_draft("", draft()).unwrap_err()), vec!["ownerId"]);
    }
}
