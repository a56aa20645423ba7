use super::*;

#[test]
fn parse_extracts_text_and_tokens() {
    let json = r#"{
        "candidates": [{
            "content": {"parts": [{"text": "Hello "}, {"text": "there."}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 8, "totalTokenCount": 20}
    }"#;

    let generation = parse_response(json).unwrap();
    assert_eq!(generation.text, "Hello there.");
    assert_eq!(generation.tokens_used, Some(20));
}

#[test]
fn parse_without_usage_metadata_has_no_tokens() {
    let json = r#"{"candidates": [{"content": {"parts": [{"text": "ok"}]}}]}"#;
    let generation = parse_response(json).unwrap();
    assert_eq!(generation.text, "ok");
    assert_eq!(generation.tokens_used, None);
}

#[test]
fn parse_prompt_block_is_blocked_error() {
    let json = r#"{"candidates": [], "promptFeedback": {"blockReason": "SAFETY"}}"#;
    let err = parse_response(json).unwrap_err();
    assert!(matches!(err, LlmError::Blocked { ref reason } if reason == "SAFETY"));
    assert!(err.is_safety_blocked());
}

#[test]
fn parse_safety_finish_reason_is_blocked_error() {
    let json = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
    let err = parse_response(json).unwrap_err();
    assert!(err.is_safety_blocked());
}

#[test]
fn parse_empty_candidates_is_empty_response() {
    let err = parse_response(r#"{"candidates": []}"#).unwrap_err();
    assert!(matches!(err, LlmError::EmptyResponse));
}

#[test]
fn parse_candidate_without_text_is_empty_response() {
    let json = r#"{"candidates": [{"content": {"parts": []}}]}"#;
    let err = parse_response(json).unwrap_err();
    assert!(matches!(err, LlmError::EmptyResponse));
}

#[test]
fn parse_malformed_json_is_parse_error() {
    let err = parse_response("not json").unwrap_err();
    assert!(matches!(err, LlmError::ApiParse(_)));
}

#[test]
fn safety_settings_cover_all_four_categories() {
    let settings = safety_settings();
    assert_eq!(settings.len(), 4);
    assert!(settings.iter().all(|s| s.threshold == "BLOCK_MEDIUM_AND_ABOVE"));
}
