//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The browser extension is the only client, so CORS is wide open and every
//! endpoint speaks JSON (except the CSV export). Routes are grouped by
//! concern: chat, visit tracking, and debug introspection.

pub mod chat;
pub mod debug;
pub mod tracking;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

/// Full application router with CORS applied.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/chat/send", post(chat::send_message))
        .route("/api/chat/history/{user_id}", get(chat::history))
        .route("/api/chat/export/{user_id}", get(chat::export_csv))
        .route("/api/chat/stats/{user_id}", get(chat::user_stats))
        .route("/api/chat/analytics", get(chat::analytics_report))
        .route("/api/chat/test", get(chat::ai_status))
        .route("/api/tracking/log", post(tracking::log_visit))
        .route("/api/tracking/history/{user_id}", get(tracking::history))
        .route("/api/tracking/analytics/{user_id}", get(tracking::analytics))
        .route("/api/tracking/update-duration", post(tracking::update_duration))
        .route("/api/debug/db-status", get(debug::db_status))
        .route("/api/debug/user-data/{user_id}", get(debug::user_data))
        .route("/api/debug/rate-limit/{user_id}/reset", post(debug::reset_rate_limit))
        .layer(cors)
        .with_state(state)
}

/// `GET /api/health` — liveness probe with database and AI status.
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db_connected = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();

    Json(serde_json::json!({
        "status": if db_connected { "healthy" } else { "degraded" },
        "service": "saleshub-backend",
        "database": db_connected,
        "ai_available": state.assistant.is_available(),
    }))
}
