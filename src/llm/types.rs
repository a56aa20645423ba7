//! Provider-neutral text-generation types and errors.

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by LLM client operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The HTTP request to the provider failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The provider returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The provider response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The provider refused to generate for content-safety reasons.
    #[error("generation blocked: {reason}")]
    Blocked { reason: String },

    /// The response contained no usable candidate text.
    #[error("response contained no candidates")]
    EmptyResponse,
}

impl LlmError {
    /// Quota and rate-limit failures are the only class retried with
    /// backoff; everything else aborts the attempt loop immediately.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::ApiResponse { status: 429, .. } => true,
            Self::ApiResponse { body, .. } => {
                let body = body.to_ascii_lowercase();
                body.contains("quota") || body.contains("resource_exhausted")
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn is_safety_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

// =============================================================================
// GENERATION
// =============================================================================

/// One generated completion.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    /// Total token count when the provider reports usage metadata.
    pub tokens_used: Option<u32>,
}

// =============================================================================
// GENERATE TRAIT
// =============================================================================

/// Provider-neutral async trait for text generation. Enables mocking in
/// tests.
#[async_trait::async_trait]
pub trait GenerateText: Send + Sync {
    /// Submit a fully assembled prompt to the provider.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] if the request fails, the response is
    /// malformed, or generation was blocked.
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<Generation, LlmError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
