//! HTTP handlers

use actix_web::{web, HttpResponse};
use chrono::Utc;
use dimscope_app::RecordService;
use dimscope_types::{Error, MeasurementDraft, MeasurementId, Result};
use log::info;
use serde_json::json;

use crate::identity::AuthenticatedUser;
use crate::response::ApiError;
use crate::server::ApiState;

type HandlerResult = std::result::Result<HttpResponse, ApiError>;

/// Run a record operation on the blocking pool; the store may touch disk
async fn with_records<T, F>(state: &ApiState, op: F) -> std::result::Result<T, ApiError>
where
    F: FnOnce(RecordService) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let records = state.records.clone();
    web::block(move || op(records))
        .await
        .map_err(|e| ApiError(Error::Other(format!("worker pool unavailable: {}", e))))?
        .map_err(ApiError::from)
}

/// Non-numeric ids can never match a record
fn parse_id(raw: &str) -> std::result::Result<MeasurementId, ApiError> {
    raw.parse::<MeasurementId>()
        .map_err(|_| ApiError(Error::NotFound(raw.to_string())))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub async fn get_stats(state: web::Data<ApiState>, user: AuthenticatedUser) -> HandlerResult {
    let now = Utc::now();
    let stats = with_records(&state, move |records| records.stats(user.id(), now)).await?;
    Ok(HttpResponse::Ok().json(stats))
}

pub async fn get_distribution(
    state: web::Data<ApiState>,
    user: AuthenticatedUser,
) -> HandlerResult {
    let distribution =
        with_records(&state, move |records| records.distribution(user.id())).await?;
    Ok(HttpResponse::Ok().json(distribution))
}

pub async fn list_measurements(
    state: web::Data<ApiState>,
    user: AuthenticatedUser,
) -> HandlerResult {
    let list = with_records(&state, move |records| records.list(user.id())).await?;
    Ok(HttpResponse::Ok().json(list))
}

pub async fn get_measurement(
    state: web::Data<ApiState>,
    user: AuthenticatedUser,
    path: web::Path<String>,
) -> HandlerResult {
    let id = parse_id(&path)?;
    let record = with_records(&state, move |records| records.get_owned(user.id(), id)).await?;
    Ok(HttpResponse::Ok().json(record))
}

pub async fn create_measurement(
    state: web::Data<ApiState>,
    user: AuthenticatedUser,
    body: web::Json<MeasurementDraft>,
) -> HandlerResult {
    let draft = body.into_inner();
    let record = with_records(&state, move |records| records.create(user.id(), draft)).await?;
    info!("Created measurement {} via API", record.id);
    Ok(HttpResponse::Created().json(record))
}

pub async fn delete_measurement(
    state: web::Data<ApiState>,
    user: AuthenticatedUser,
    path: web::Path<String>,
) -> HandlerResult {
    let id = parse_id(&path)?;
    with_records(&state, move |records| records.delete_owned(user.id(), id)).await?;
    Ok(HttpResponse::NoContent().finish())
}
