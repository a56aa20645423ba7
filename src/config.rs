//! Service configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! All knobs come from the environment with typed defaults. `.env` loading
//! happens once in `main` via dotenvy. The Gemini key is optional: a missing
//! or placeholder value leaves the assistant in degraded mode rather than
//! failing startup.

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";

/// Placeholder shipped in `.env.example`; treated the same as no key at all.
const PLACEHOLDER_API_KEY: &str = "your_actual_gemini_api_key_here";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
}

impl Config {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `DATABASE_URL`
    ///
    /// Optional:
    /// - `PORT`: default 5000
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `GEMINI_API_KEY`: AI replies disabled when absent
    /// - `GEMINI_MODEL`: default `gemini-pro`
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL required"),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            gemini_api_key: api_key_from(std::env::var("GEMINI_API_KEY").ok().as_deref()),
            gemini_model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
        }
    }
}

/// Normalize a raw key value: empty and placeholder values count as unset.
fn api_key_from(raw: Option<&str>) -> Option<String> {
    let key = raw?.trim();
    if key.is_empty() || key == PLACEHOLDER_API_KEY {
        return None;
    }
    Some(key.to_owned())
}

pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
