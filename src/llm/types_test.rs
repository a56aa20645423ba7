use super::*;

#[test]
fn status_429_is_rate_limited() {
    let err = LlmError::ApiResponse { status: 429, body: String::new() };
    assert!(err.is_rate_limited());
}

#[test]
fn quota_body_is_rate_limited() {
    let err = LlmError::ApiResponse {
        status: 400,
        body: r#"{"error":{"status":"RESOURCE_EXHAUSTED","message":"Quota exceeded"}}"#.into(),
    };
    assert!(err.is_rate_limited());
}

#[test]
fn plain_server_error_is_not_rate_limited() {
    let err = LlmError::ApiResponse { status: 500, body: "internal error".into() };
    assert!(!err.is_rate_limited());
    let err = LlmError::ApiRequest("connection refused".into());
    assert!(!err.is_rate_limited());
}

#[test]
fn blocked_is_safety_only() {
    let blocked = LlmError::Blocked { reason: "SAFETY".into() };
    assert!(blocked.is_safety_blocked());
    assert!(!blocked.is_rate_limited());

    let other = LlmError::EmptyResponse;
    assert!(!other.is_safety_blocked());
}
