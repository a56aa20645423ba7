//! Gemini LLM integration.
//!
//! DESIGN
//! ======
//! `GenerateText` is the provider seam: the assistant service talks to the
//! trait, tests mock it, and `GeminiClient` is the one production
//! implementation — a thin reqwest wrapper with pure response parsing.

pub mod gemini;
pub mod types;

pub use gemini::GeminiClient;
pub use types::{GenerateText, Generation, LlmError};
