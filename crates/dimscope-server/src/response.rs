//! Error responses

use actix_web::http::StatusCode;
use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse, ResponseError};
use dimscope_types::{Error, ValidationErrors};
use log::error;
use serde::Serialize;

/// Body of every non-2xx reply
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ValidationErrors>,
}

/// [`Error`] as an HTTP reply
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::StorageUnavailable(_) | Error::DetectionUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed ({}): {}", status.as_u16(), self.0);
        }

        let details = match &self.0 {
            Error::Validation(errors) => Some(errors.clone()),
            _ => None,
        };
        HttpResponse::build(status).json(ErrorBody {
            error: self.0.to_string(),
            details,
        })
    }
}

/// Unreadable JSON bodies become a 400 validation reply
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
        let errors = ValidationErrors::single("body", err.to_string());
        ApiError(Error::Validation(errors)).into()
    })
}
