//! Caller identity taken from the upstream identity provider's header

use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use dimscope_types::Error;
use log::warn;

use crate::response::ApiError;
use crate::server::ApiState;

/// User id of the authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

impl AuthenticatedUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}

fn identify(req: &HttpRequest) -> Result<AuthenticatedUser, ApiError> {
    let state = req
        .app_data::<web::Data<ApiState>>()
        .ok_or_else(|| Error::Other("server state not configured".to_string()))?;

    let user = req
        .headers()
        .get(state.owner_header.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match user {
        Some(id) => Ok(AuthenticatedUser(id.to_string())),
        None => {
            warn!("Rejected {} {}: no caller identity", req.method(), req.path());
            Err(Error::Unauthorized.into())
        }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(identify(req))
    }
}
