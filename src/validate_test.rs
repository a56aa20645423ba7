use super::*;

#[test]
fn missing_message_rejected() {
    assert_eq!(validate_message(None), Err(ValidationError::MissingMessage));
}

#[test]
fn whitespace_only_message_rejected() {
    assert_eq!(validate_message(Some("   \n\t ")), Err(ValidationError::EmptyMessage));
}

#[test]
fn over_length_message_rejected() {
    let long = "a".repeat(MAX_MESSAGE_LENGTH + 1);
    assert_eq!(validate_message(Some(&long)), Err(ValidationError::MessageTooLong));
}

#[test]
fn message_is_trimmed_and_kept() {
    assert_eq!(validate_message(Some("  hello  ")).unwrap(), "hello");
}

#[test]
fn html_is_escaped() {
    let out = validate_message(Some("<script>alert('x')</script>")).unwrap();
    assert_eq!(out, "&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;");
}

#[test]
fn javascript_uris_are_stripped() {
    let out = validate_message(Some("click JavaScript:alert(1) now")).unwrap();
    assert!(!out.to_ascii_lowercase().contains("javascript:"));
    assert!(out.contains("alert(1)"));
}

#[test]
fn event_handlers_are_stripped() {
    let out = validate_message(Some("img onload=steal() and OnClick =pwn()")).unwrap();
    assert_eq!(out, "img steal() and pwn()");
}

#[test]
fn plain_on_words_survive() {
    let out = validate_message(Some("log on = true, onion rings, on time")).unwrap();
    assert!(out.contains("onion rings"));
    assert!(out.contains("on time"));
}

#[test]
fn identity_charset_enforced() {
    assert!(validate_identity("user_id", "user-123_ok").is_ok());
    assert_eq!(
        validate_identity("user_id", "bad id!"),
        Err(ValidationError::IdentityInvalidChars { field: "user_id" })
    );
}

#[test]
fn identity_length_and_presence_enforced() {
    assert_eq!(
        validate_identity("session_id", ""),
        Err(ValidationError::MissingIdentity { field: "session_id" })
    );
    let long = "a".repeat(MAX_IDENTITY_LENGTH + 1);
    assert_eq!(
        validate_identity("user_id", &long),
        Err(ValidationError::IdentityTooLong { field: "user_id" })
    );
}

#[test]
fn error_messages_are_displayable() {
    assert_eq!(ValidationError::EmptyMessage.to_string(), "Message cannot be empty");
    assert_eq!(
        ValidationError::IdentityInvalidChars { field: "user_id" }.to_string(),
        "user_id contains invalid characters"
    );
}
