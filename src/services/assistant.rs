//! Assistant service — prompt assembly, retried Gemini calls, fallbacks.
//!
//! DESIGN
//! ======
//! `generate` never surfaces a raw backend error: every failure class folds
//! into a displayable reply so the chat route always has text to return.
//! Quota-class failures are retried with exponential backoff (2s, 4s);
//! anything else aborts the attempt loop immediately. When no LLM client is
//! configured the assistant short-circuits to a fixed instructional reply
//! without touching the network.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use crate::llm::{GenerateText, Generation, LlmError};

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);
const HISTORY_TURN_LIMIT: usize = 10;

const SYSTEM_PROMPT: &str = "\
You are SalesHub AI, a professional sales assistant for a sales team. Your role is to:

1. **Help craft compelling communications**: Assist with emails, follow-up messages, LinkedIn outreach, and proposals
2. **Provide sales strategies**: Suggest objection handling techniques, closing strategies, and negotiation tips
3. **Answer product/service questions**: Help explain features, benefits, and value propositions
4. **Lead qualification**: Help with discovery questions and qualifying leads
5. **Research assistance**: Help analyze prospects, industries, and competitive landscape

Guidelines:
- Be professional, helpful, and action-oriented
- Provide specific, actionable advice (not generic tips)
- Use a confident but friendly tone
- Keep responses concise but comprehensive
- When writing emails or messages, make them ready to send
- Focus on value and outcomes, not just features
";

const UNAVAILABLE_REPLY: &str = "Hello! I'm SalesHub AI, your sales assistant. \
To enable AI chat features, please configure the Gemini API key. \
Get a free API key from https://ai.google.dev/";

const QUOTA_REPLY: &str = "I'm currently experiencing high demand. Please wait a moment and try again. \
If this persists, your daily API quota may have been reached.";

const SAFETY_REPLY: &str = "I couldn't process that request due to content safety filters. \
Please rephrase your question.";

const GENERIC_REPLY: &str = "I apologize, but I'm having trouble processing your request. \
Please try again in a moment.";

// =============================================================================
// TYPES
// =============================================================================

/// One conversation turn fed into prompt assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub text: String,
}

/// Normalized assistant reply. Failures are folded into displayable text,
/// never surfaced raw.
#[derive(Debug, Clone)]
pub struct AiReply {
    pub text: String,
    pub tokens_used: Option<u32>,
}

// =============================================================================
// ASSISTANT
// =============================================================================

#[derive(Clone)]
pub struct Assistant {
    llm: Option<Arc<dyn GenerateText>>,
}

impl Assistant {
    #[must_use]
    pub fn new(llm: Option<Arc<dyn GenerateText>>) -> Self {
        Self { llm }
    }

    /// Whether a backend client was configured at startup. Health and test
    /// endpoints report this without spending quota.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.llm.is_some()
    }

    /// Generate a reply for `message`, with optional free-form `context` and
    /// recent conversation `history`. Always returns displayable text.
    pub async fn generate(
        &self,
        message: &str,
        context: Option<&str>,
        history: &[Turn],
        max_output_tokens: u32,
    ) -> AiReply {
        let Some(llm) = &self.llm else {
            return AiReply { text: UNAVAILABLE_REPLY.to_owned(), tokens_used: None };
        };

        let prompt = build_prompt(message, context, history);
        match call_with_retry(llm.as_ref(), &prompt, max_output_tokens).await {
            Ok(generation) => AiReply { text: generation.text, tokens_used: generation.tokens_used },
            Err(e) => {
                error!(error = %e, "gemini call failed, returning fallback reply");
                AiReply { text: fallback_reply(&e).to_owned(), tokens_used: None }
            }
        }
    }
}

// =============================================================================
// PROMPT ASSEMBLY
// =============================================================================

/// Concatenate the persona block, the last ten conversation turns (oldest
/// first), the context block, the current message, and the closing
/// instruction. The order is fixed; the model relies on recency and
/// instruction-last framing.
pub(crate) fn build_prompt(message: &str, context: Option<&str>, history: &[Turn]) -> String {
    let mut parts = vec![SYSTEM_PROMPT.to_owned()];

    if !history.is_empty() {
        parts.push("\n--- Recent Conversation ---".to_owned());
        let start = history.len().saturating_sub(HISTORY_TURN_LIMIT);
        for turn in &history[start..] {
            if turn.role == "user" {
                parts.push(format!("User: {}", turn.text));
            } else {
                parts.push(format!("Assistant: {}", turn.text));
            }
        }
        parts.push("--- End of History ---\n".to_owned());
    }

    if let Some(context) = context {
        parts.push(format!("Additional Context: {context}\n"));
    }

    parts.push(format!("Current User Message: {message}"));
    parts.push("\nProvide a helpful, sales-focused response:".to_owned());

    parts.join("\n")
}

// =============================================================================
// RETRY LOOP
// =============================================================================

fn backoff_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY * 2u32.pow(attempt)
}

/// Bounded retry: up to [`MAX_ATTEMPTS`] calls, sleeping between attempts
/// only for quota-class failures. Non-retriable failures and the final
/// attempt's failure are returned to the caller as-is.
async fn call_with_retry(
    llm: &dyn GenerateText,
    prompt: &str,
    max_output_tokens: u32,
) -> Result<Generation, LlmError> {
    let mut attempt = 0;
    loop {
        match llm.generate(prompt, max_output_tokens).await {
            Ok(generation) => return Ok(generation),
            Err(e) if e.is_rate_limited() && attempt + 1 < MAX_ATTEMPTS => {
                let delay = backoff_delay(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_attempts = MAX_ATTEMPTS,
                    delay_secs = delay.as_secs(),
                    "rate limited by gemini, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn fallback_reply(error: &LlmError) -> &'static str {
    if error.is_rate_limited() {
        QUOTA_REPLY
    } else if error.is_safety_blocked() {
        SAFETY_REPLY
    } else {
        GENERIC_REPLY
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "assistant_test.rs"]
mod tests;
