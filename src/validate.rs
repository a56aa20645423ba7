//! Request input validation and sanitization.
//!
//! Messages are trimmed, length-checked, and HTML-escaped before they reach
//! storage or prompt assembly. Identifiers (user/session) are restricted to
//! a safe charset since they flow into file names and log lines.

pub const MAX_MESSAGE_LENGTH: usize = 2000;
pub const MAX_IDENTITY_LENGTH: usize = 100;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Message is required")]
    MissingMessage,
    #[error("Message cannot be empty")]
    EmptyMessage,
    #[error("Message too long. Maximum {MAX_MESSAGE_LENGTH} characters allowed")]
    MessageTooLong,
    #[error("{field} is required")]
    MissingIdentity { field: &'static str },
    #[error("{field} too long. Maximum {MAX_IDENTITY_LENGTH} characters")]
    IdentityTooLong { field: &'static str },
    #[error("{field} contains invalid characters")]
    IdentityInvalidChars { field: &'static str },
}

/// Validate and sanitize a chat message.
///
/// # Errors
///
/// Returns a [`ValidationError`] when the message is absent, empty after
/// trimming, or over the length cap.
pub fn validate_message(message: Option<&str>) -> Result<String, ValidationError> {
    let Some(message) = message else {
        return Err(ValidationError::MissingMessage);
    };
    let message = message.trim();
    if message.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ValidationError::MessageTooLong);
    }
    Ok(sanitize(message))
}

/// Validate a caller-supplied identity string (user or session ID).
///
/// # Errors
///
/// Returns a [`ValidationError`] naming the offending field.
pub fn validate_identity(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::MissingIdentity { field });
    }
    if value.len() > MAX_IDENTITY_LENGTH {
        return Err(ValidationError::IdentityTooLong { field });
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(ValidationError::IdentityInvalidChars { field });
    }
    Ok(())
}

/// Escape HTML entities, then strip `javascript:` URI fragments and inline
/// event-handler fragments (`onload=`, `onclick =`, ...). Escaping removes
/// any possibility of live tags; the strips guard stored text that later
/// lands in an attribute-like context.
fn sanitize(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    let stripped = strip_ascii_case_insensitive(&escaped, "javascript:");
    strip_event_handlers(&stripped).trim().to_owned()
}

/// Remove `on<word>=` sequences (with optional whitespace before `=`),
/// matched case-insensitively.
fn strip_event_handlers(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].eq_ignore_ascii_case(&b'o') && i + 1 < bytes.len() && bytes[i + 1].eq_ignore_ascii_case(&b'n') {
            let mut j = i + 2;
            while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
                j += 1;
            }
            let name_len = j - (i + 2);
            let mut k = j;
            while k < bytes.len() && (bytes[k] == b' ' || bytes[k] == b'\t') {
                k += 1;
            }
            if name_len > 0 && k < bytes.len() && bytes[k] == b'=' {
                i = k + 1;
                continue;
            }
        }
        let ch_len = text[i..].chars().next().map_or(1, char::len_utf8);
        out.push_str(&text[i..i + ch_len]);
        i += ch_len;
    }
    out
}

/// Remove every occurrence of `needle` (ASCII, matched case-insensitively).
fn strip_ascii_case_insensitive(haystack: &str, needle: &str) -> String {
    debug_assert!(needle.is_ascii());
    let lower = haystack.to_ascii_lowercase();
    let mut out = String::with_capacity(haystack.len());
    let mut cursor = 0;
    while let Some(found) = lower[cursor..].find(needle) {
        let start = cursor + found;
        out.push_str(&haystack[cursor..start]);
        cursor = start + needle.len();
    }
    out.push_str(&haystack[cursor..]);
    out
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
