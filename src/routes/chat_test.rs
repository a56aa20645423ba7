use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Json, State};
use axum::http::StatusCode;
use axum::http::header::RETRY_AFTER;
use time::macros::datetime;
use uuid::Uuid;

use super::{SendMessageBody, csv_field, render_csv, send_message};
use crate::services::chat::ChatMessageRow;
use crate::state::test_helpers::test_app_state;

fn row(message_text: &str, session_id: Option<&str>) -> ChatMessageRow {
    ChatMessageRow {
        chat_id: 1,
        message_id: Uuid::nil(),
        session_id: session_id.map(str::to_owned),
        message_type: "user".to_owned(),
        message_text: message_text.to_owned(),
        created_at: datetime!(2026-08-29 12:00:00 UTC),
        response_time_ms: None,
        tokens_used: None,
    }
}

#[test]
fn csv_field_passes_plain_text_through() {
    assert_eq!(csv_field("hello world"), "hello world");
}

#[test]
fn csv_field_quotes_delimiters() {
    assert_eq!(csv_field("a,b"), "\"a,b\"");
    assert_eq!(csv_field("line\nbreak"), "\"line\nbreak\"");
}

#[test]
fn csv_field_doubles_embedded_quotes() {
    assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
}

#[test]
fn render_csv_has_header_and_one_line_per_row() {
    let rows = vec![row("first", Some("s1")), row("second, with comma", None)];
    let csv = render_csv(&rows);
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Timestamp,Type,Message,Message ID,Session ID");
    assert!(lines[1].contains("first"));
    assert!(lines[1].ends_with(",s1"));
    assert!(lines[2].contains("\"second, with comma\""));
    assert!(lines[2].ends_with(','));
}

#[test]
fn render_csv_empty_is_header_only() {
    let csv = render_csv(&[]);
    assert_eq!(csv, "Timestamp,Type,Message,Message ID,Session ID\n");
}

// ===== send_message admission paths (no DB needed before admission) =====

fn client_addr(ip: &str) -> ConnectInfo<SocketAddr> {
    ConnectInfo(format!("{ip}:4567").parse().unwrap())
}

fn body(message: Option<&str>, user_id: Option<&str>) -> Json<SendMessageBody> {
    Json(SendMessageBody {
        message: message.map(str::to_owned),
        user_id: user_id.map(str::to_owned),
        session_id: None,
        context: None,
    })
}

#[tokio::test]
async fn invalid_message_is_rejected_before_any_work() {
    let state = test_app_state();
    let response = send_message(State(state), client_addr("203.0.113.9"), body(Some("   "), None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_user_id_is_rejected() {
    let state = test_app_state();
    let response =
        send_message(State(state), client_addr("203.0.113.9"), body(Some("hi"), Some("bad id!"))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn anonymous_requests_share_the_client_address_bucket() {
    let state = test_app_state();

    // Exhaust the quota for this client address directly, as earlier
    // anonymous requests from the same client would have.
    while state.rate_limiter.check("203.0.113.9").is_ok() {
        state.rate_limiter.record("203.0.113.9");
    }

    let response =
        send_message(State(state.clone()), client_addr("203.0.113.9"), body(Some("hello"), None)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(RETRY_AFTER));

    // A different client address is unaffected.
    assert!(state.rate_limiter.check("198.51.100.7").is_ok());
}

#[tokio::test]
async fn named_user_has_its_own_bucket() {
    let state = test_app_state();

    while state.rate_limiter.check("203.0.113.9").is_ok() {
        state.rate_limiter.record("203.0.113.9");
    }

    // The address bucket being full must not throttle a caller that
    // identifies itself, and vice versa.
    assert!(state.rate_limiter.check("alice").is_ok());
    while state.rate_limiter.check("alice").is_ok() {
        state.rate_limiter.record("alice");
    }
    let response =
        send_message(State(state), client_addr("198.51.100.7"), body(Some("hello"), Some("alice"))).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
