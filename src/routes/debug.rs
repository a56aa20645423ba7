//! Debug and introspection endpoints.
//!
//! These are operational conveniences for development and support, not part
//! of the extension's API surface. They expose only coarse counts plus a
//! single user's own data.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::json;
use tracing::error;

use crate::services::chat;
use crate::state::AppState;
use crate::validate::validate_identity;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into(), "success": false })))
}

fn db_error(err: &sqlx::Error) -> ApiError {
    error!(error = %err, "debug query failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// `GET /api/debug/db-status` — connectivity check plus per-table row counts.
pub async fn db_status(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT table_name FROM information_schema.tables
         WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
         ORDER BY table_name",
    )
    .fetch_all(&state.pool)
    .await
    .map_err(|e| db_error(&e))?;

    let mut counts = serde_json::Map::new();
    for (table,) in &tables {
        // Table names come from the catalog, not the caller.
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{table}\""))
            .fetch_one(&state.pool)
            .await
            .map_err(|e| db_error(&e))?;
        counts.insert(table.clone(), json!(count));
    }

    Ok(Json(json!({
        "success": true,
        "connected": true,
        "tables": counts,
    })))
}

/// `GET /api/debug/user-data/:user_id` — user row plus recent messages.
pub async fn user_data(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_identity("user_id", &user_id).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let user = chat::find_user(&state.pool, &user_id)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let messages = chat::recent_messages(&state.pool, &user_id, 20)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "user": user,
        "recent_messages": messages,
        "usage": state.rate_limiter.usage(&user_id),
        "stats": state.analytics.user_stats(&user_id),
    })))
}

/// `POST /api/debug/rate-limit/:user_id/reset` — clear a user's quota.
pub async fn reset_rate_limit(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_identity("user_id", &user_id).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    state.rate_limiter.reset(&user_id);
    Ok(Json(json!({ "success": true, "user_id": user_id })))
}
