//! Chat endpoints: send, history, export, stats, analytics.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, RETRY_AFTER};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use tracing::error;
use uuid::Uuid;

use crate::analytics::ResponseTimer;
use crate::services::chat::{self, ChatError, ChatMessageRow, NewMessage};
use crate::state::AppState;
use crate::validate::{validate_identity, validate_message};

/// Output cap passed to the model per reply.
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 800;

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 200;

/// How many prior turns are fed back into the prompt.
const CONTEXT_TURN_LIMIT: i64 = 10;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into(), "success": false })))
}

fn chat_error_to_api(err: &ChatError) -> ApiError {
    match err {
        ChatError::Database(_) => api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
    }
}

// =============================================================================
// SEND
// =============================================================================

#[derive(Deserialize)]
pub struct SendMessageBody {
    pub message: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub context: Option<String>,
}

/// `POST /api/chat/send` — validate, rate-limit, persist, and answer.
pub async fn send_message(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<SendMessageBody>,
) -> Response {
    let message = match validate_message(body.message.as_deref()) {
        Ok(message) => message,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    for (field, value) in [("user_id", &body.user_id), ("session_id", &body.session_id)] {
        if let Some(value) = value {
            if let Err(e) = validate_identity(field, value) {
                return api_error(StatusCode::BAD_REQUEST, e.to_string()).into_response();
            }
        }
    }

    // Quota identity falls back to the client address when no user_id is
    // supplied; a per-request generated ID would give every anonymous call
    // a fresh, empty bucket.
    let limiter_identity = body
        .user_id
        .clone()
        .unwrap_or_else(|| addr.ip().to_string());
    let user_id = body.user_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let session_id = body.session_id.unwrap_or_else(|| Uuid::new_v4().to_string());

    // Admission check happens before any work; the request is only counted
    // against the caller's quota once it is admitted.
    if let Err(limit_err) = state.rate_limiter.check(&limiter_identity) {
        let retry_after = limit_err.retry_after_secs();
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(RETRY_AFTER, retry_after.to_string())],
            Json(json!({
                "error": limit_err.to_string(),
                "success": false,
                "retry_after": retry_after,
            })),
        )
            .into_response();
    }
    state.rate_limiter.record(&limiter_identity);
    state.analytics.track_message(&user_id);

    match handle_chat(&state, &limiter_identity, &user_id, &session_id, &message, body.context.as_deref()).await
    {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            error!(error = %e, user_id, "chat request failed");
            state.analytics.track_error("chat_error");
            chat_error_to_api(&e).into_response()
        }
    }
}

/// Persist the user message, generate the reply, persist it, and assemble
/// the response payload.
async fn handle_chat(
    state: &AppState,
    limiter_identity: &str,
    user_id: &str,
    session_id: &str,
    message: &str,
    extra_context: Option<&str>,
) -> Result<serde_json::Value, ChatError> {
    chat::ensure_user(&state.pool, user_id, session_id).await?;

    chat::store_message(
        &state.pool,
        &NewMessage {
            user_id,
            session_id,
            message_type: "user",
            message_text: message,
            response_time_ms: None,
            tokens_used: None,
        },
    )
    .await?;

    let history = chat::conversation_history(&state.pool, user_id, session_id, CONTEXT_TURN_LIMIT).await?;

    let mut context = format!("Sales team member using SalesHub AI assistant. Session: {session_id}");
    if let Some(extra) = extra_context {
        context.push('\n');
        context.push_str(extra);
    }

    // The assistant never errors (fallback replies instead), so the timer
    // always records a successful sample here; route-level failures are
    // tracked by the caller.
    let timer = ResponseTimer::start(&state.analytics);
    let reply = state
        .assistant
        .generate(message, Some(&context), &history, DEFAULT_MAX_OUTPUT_TOKENS)
        .await;
    let response_time_ms = timer.finish();

    let message_id = chat::store_message(
        &state.pool,
        &NewMessage {
            user_id,
            session_id,
            message_type: "assistant",
            message_text: &reply.text,
            response_time_ms: i32::try_from(response_time_ms).ok(),
            tokens_used: reply.tokens_used.and_then(|t| i32::try_from(t).ok()),
        },
    )
    .await?;

    let usage = state.rate_limiter.usage(limiter_identity);
    Ok(json!({
        "success": true,
        "response": reply.text,
        "message_id": message_id,
        "user_id": user_id,
        "session_id": session_id,
        "timestamp": OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        "performance": {
            "response_time_ms": response_time_ms,
            "tokens_used": reply.tokens_used,
        },
        "rate_limit": usage,
    }))
}

// =============================================================================
// HISTORY + EXPORT
// =============================================================================

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub session_id: Option<String>,
    pub limit: Option<i64>,
}

/// `GET /api/chat/history/:user_id` — chronological transcript.
pub async fn history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_identity("user_id", &user_id).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let rows = chat::fetch_history(&state.pool, &user_id, query.session_id.as_deref(), Some(limit))
        .await
        .map_err(|e| log_and_convert(&e, "history query failed"))?;

    Ok(Json(json!({
        "success": true,
        "user_id": user_id,
        "count": rows.len(),
        "messages": rows,
    })))
}

#[derive(Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

/// `GET /api/chat/export/:user_id?format=json|csv` — full transcript as a
/// download. Defaults to CSV.
pub async fn export_csv(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    validate_identity("user_id", &user_id).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let format = query.format.as_deref().unwrap_or("csv");
    if format != "csv" && format != "json" {
        return Err(api_error(StatusCode::BAD_REQUEST, "format must be 'csv' or 'json'"));
    }

    let rows = chat::fetch_history(&state.pool, &user_id, None, None)
        .await
        .map_err(|e| log_and_convert(&e, "export query failed"))?;

    if format == "json" {
        return Ok(Json(json!({
            "success": true,
            "user_id": user_id,
            "count": rows.len(),
            "messages": rows,
        }))
        .into_response());
    }

    let csv = render_csv(&rows);
    let filename = format!("attachment; filename=\"chat_history_{user_id}.csv\"");
    Ok((
        [(CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()), (CONTENT_DISPOSITION, filename)],
        csv,
    )
        .into_response())
}

fn render_csv(rows: &[ChatMessageRow]) -> String {
    let mut out = String::from("Timestamp,Type,Message,Message ID,Session ID\n");
    for row in rows {
        let timestamp = row.created_at.format(&Rfc3339).unwrap_or_default();
        out.push_str(&csv_field(&timestamp));
        out.push(',');
        out.push_str(&csv_field(&row.message_type));
        out.push(',');
        out.push_str(&csv_field(&row.message_text));
        out.push(',');
        out.push_str(&csv_field(&row.message_id.to_string()));
        out.push(',');
        out.push_str(&csv_field(row.session_id.as_deref().unwrap_or("")));
        out.push('\n');
    }
    out
}

/// Quote a field when it contains a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

// =============================================================================
// STATS + ANALYTICS
// =============================================================================

/// `GET /api/chat/stats/:user_id` — in-memory counters plus usage snapshot
/// and the durable message count.
pub async fn user_stats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_identity("user_id", &user_id).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let stored_messages = chat::count_user_messages(&state.pool, &user_id)
        .await
        .map_err(|e| log_and_convert(&e, "stats query failed"))?;
    let stats = state.analytics.user_stats(&user_id);
    let usage = state.rate_limiter.usage(&user_id);

    Ok(Json(json!({
        "success": true,
        "user_id": user_id,
        "stats": stats,
        "stored_messages": stored_messages,
        "rate_limit": usage,
    })))
}

#[derive(Deserialize)]
pub struct AnalyticsQuery {
    pub date: Option<String>,
}

/// `GET /api/chat/analytics?date=YYYY-MM-DD` — daily report plus system
/// totals. Defaults to today when no date is given.
pub async fn analytics_report(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let date = match query.date.as_deref() {
        Some(raw) => Some(
            time::Date::parse(raw, format_description!("[year]-[month]-[day]"))
                .map_err(|_| api_error(StatusCode::BAD_REQUEST, "Invalid date format. Use YYYY-MM-DD"))?,
        ),
        None => None,
    };

    Ok(Json(json!({
        "success": true,
        "report": state.analytics.daily_report(date),
        "system": state.analytics.system_stats(),
    })))
}

/// `GET /api/chat/test` — reports whether the AI backend is configured,
/// without spending quota.
pub async fn ai_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "ai_available": state.assistant.is_available(),
    }))
}

fn log_and_convert(err: &ChatError, message: &str) -> ApiError {
    error!(error = %err, "{message}");
    chat_error_to_api(err)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
