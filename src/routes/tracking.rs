//! Website-visit tracking endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use tracing::error;

use crate::services::tracking::{self, NewVisit, TrackingError};
use crate::state::AppState;
use crate::validate::validate_identity;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;
const DEFAULT_SUMMARY_DAYS: i64 = 7;
const MAX_SUMMARY_DAYS: i64 = 30;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into(), "success": false })))
}

fn tracking_error_to_api(err: &TrackingError) -> ApiError {
    match err {
        TrackingError::VisitNotFound(_) => api_error(StatusCode::NOT_FOUND, err.to_string()),
        TrackingError::Database(_) => {
            error!(error = %err, "tracking query failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// `POST /api/tracking/log` — record a visit event.
pub async fn log_visit(
    State(state): State<AppState>,
    Json(visit): Json<NewVisit>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_identity("user_id", &visit.user_id)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    if visit.url.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "url is required"));
    }

    let (visit_id, created_at) = tracking::log_visit(&state.pool, &visit)
        .await
        .map_err(|e| tracking_error_to_api(&e))?;

    Ok(Json(json!({
        "success": true,
        "visit_id": visit_id,
        "timestamp": created_at.format(&Rfc3339).unwrap_or_default(),
    })))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub domain: Option<String>,
    pub days: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /api/tracking/history/:user_id` — paged visit history, newest first.
pub async fn history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_identity("user_id", &user_id).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);
    let days = query.days.map(|d| d.clamp(1, MAX_SUMMARY_DAYS));

    let visits = tracking::visit_history(&state.pool, &user_id, query.domain.as_deref(), days, limit, offset)
        .await
        .map_err(|e| tracking_error_to_api(&e))?;

    Ok(Json(json!({
        "success": true,
        "user_id": user_id,
        "count": visits.len(),
        "visits": visits,
    })))
}

#[derive(Deserialize)]
pub struct SummaryQuery {
    pub days: Option<i64>,
}

/// `GET /api/tracking/analytics/:user_id` — browsing summary over a
/// trailing window of days (default 7).
pub async fn analytics(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_identity("user_id", &user_id).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let days = query.days.unwrap_or(DEFAULT_SUMMARY_DAYS).clamp(1, MAX_SUMMARY_DAYS);
    let summary = tracking::browsing_summary(&state.pool, &user_id, days)
        .await
        .map_err(|e| tracking_error_to_api(&e))?;

    Ok(Json(json!({
        "success": true,
        "user_id": user_id,
        "days": days,
        "summary": summary,
    })))
}

#[derive(Deserialize)]
pub struct UpdateDurationBody {
    pub visit_id: i64,
    pub duration_seconds: i32,
}

/// `POST /api/tracking/update-duration` — patch dwell time after tab close.
pub async fn update_duration(
    State(state): State<AppState>,
    Json(body): Json<UpdateDurationBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.duration_seconds < 0 {
        return Err(api_error(StatusCode::BAD_REQUEST, "duration_seconds must be non-negative"));
    }

    tracking::update_duration(&state.pool, body.visit_id, body.duration_seconds)
        .await
        .map_err(|e| tracking_error_to_api(&e))?;

    Ok(Json(json!({ "success": true, "visit_id": body.visit_id })))
}
