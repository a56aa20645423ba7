//! In-memory rate limiting for chat requests.
//!
//! DESIGN
//! ======
//! Sliding-window timestamp buckets per identity, backed by
//! `HashMap<String, VecDeque<Instant>>`. Two windows are enforced and both
//! must have capacity for a request to be admitted:
//! - 60s window: 20 requests (default)
//! - 86400s window: 500 requests (default)
//!
//! `check` and `record` are separate operations so read-only probes (the
//! usage endpoint) can inspect capacity without consuming it. The chat route
//! records only after an admitted check. Both buckets are pruned inside the
//! same critical section that counts them, so a concurrent pair of checks
//! can never both see the last free slot.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const MINUTE_WINDOW: Duration = Duration::from_secs(60);
pub const DAY_WINDOW: Duration = Duration::from_secs(86_400);

const DEFAULT_PER_MINUTE_LIMIT: usize = 20;
const DEFAULT_PER_DAY_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub per_minute: usize,
    pub per_day: usize,
}

impl RateLimitConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            per_minute: env_parse("RATE_LIMIT_PER_MINUTE", DEFAULT_PER_MINUTE_LIMIT),
            per_day: env_parse("RATE_LIMIT_PER_DAY", DEFAULT_PER_DAY_LIMIT),
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Rate limit exceeded. Maximum {limit} requests per minute.")]
    MinuteExceeded { limit: usize, retry_after_secs: u64 },
    #[error("Daily limit exceeded. Maximum {limit} requests per day.")]
    DayExceeded { limit: usize, retry_after_secs: u64 },
}

impl RateLimitError {
    /// Seconds until the oldest in-window request expires. Always >= 1 so a
    /// rejected caller never re-hammers immediately.
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            Self::MinuteExceeded { retry_after_secs, .. } | Self::DayExceeded { retry_after_secs, .. } => {
                *retry_after_secs
            }
        }
    }
}

// =============================================================================
// USAGE SNAPSHOT
// =============================================================================

/// Current per-identity usage after pruning, for the stats endpoints.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct UsageSnapshot {
    pub requests_this_minute: usize,
    pub requests_today: usize,
    pub minute_limit: usize,
    pub day_limit: usize,
    pub minute_remaining: usize,
    pub day_remaining: usize,
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
    config: RateLimitConfig,
}

struct RateLimiterInner {
    /// Per-identity timestamps inside the trailing minute.
    minute_requests: HashMap<String, VecDeque<Instant>>,
    /// Per-identity timestamps inside the trailing day.
    day_requests: HashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::from_env())
    }

    #[must_use]
    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateLimiterInner {
                minute_requests: HashMap::new(),
                day_requests: HashMap::new(),
            })),
            config,
        }
    }

    /// Check whether `identity` may issue a request right now.
    ///
    /// Does NOT record the request; callers that proceed must call
    /// [`RateLimiter::record`] after admission.
    ///
    /// # Errors
    ///
    /// Returns a [`RateLimitError`] carrying the retry-after delay when
    /// either window is at capacity.
    pub fn check(&self, identity: &str) -> Result<(), RateLimitError> {
        self.check_at(identity, Instant::now())
    }

    /// Internal: check with explicit timestamp (for testing).
    fn check_at(&self, identity: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let cfg = self.config;

        let minute = inner.minute_requests.entry(identity.to_owned()).or_default();
        prune_window(minute, now, MINUTE_WINDOW);
        if minute.len() >= cfg.per_minute {
            return Err(RateLimitError::MinuteExceeded {
                limit: cfg.per_minute,
                retry_after_secs: retry_after(minute.front().copied(), now, MINUTE_WINDOW),
            });
        }

        let day = inner.day_requests.entry(identity.to_owned()).or_default();
        prune_window(day, now, DAY_WINDOW);
        if day.len() >= cfg.per_day {
            return Err(RateLimitError::DayExceeded {
                limit: cfg.per_day,
                retry_after_secs: retry_after(day.front().copied(), now, DAY_WINDOW),
            });
        }

        Ok(())
    }

    /// Record an admitted request for `identity` in both windows.
    pub fn record(&self, identity: &str) {
        self.record_at(identity, Instant::now());
    }

    fn record_at(&self, identity: &str, now: Instant) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner
            .minute_requests
            .entry(identity.to_owned())
            .or_default()
            .push_back(now);
        inner
            .day_requests
            .entry(identity.to_owned())
            .or_default()
            .push_back(now);
    }

    /// Current usage for `identity` after pruning. Read-only: never records.
    #[must_use]
    pub fn usage(&self, identity: &str) -> UsageSnapshot {
        self.usage_at(identity, Instant::now())
    }

    fn usage_at(&self, identity: &str, now: Instant) -> UsageSnapshot {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let cfg = self.config;

        let requests_this_minute = {
            let minute = inner.minute_requests.entry(identity.to_owned()).or_default();
            prune_window(minute, now, MINUTE_WINDOW);
            minute.len()
        };
        let requests_today = {
            let day = inner.day_requests.entry(identity.to_owned()).or_default();
            prune_window(day, now, DAY_WINDOW);
            day.len()
        };

        UsageSnapshot {
            requests_this_minute,
            requests_today,
            minute_limit: cfg.per_minute,
            day_limit: cfg.per_day,
            minute_remaining: cfg.per_minute.saturating_sub(requests_this_minute),
            day_remaining: cfg.per_day.saturating_sub(requests_today),
        }
    }

    /// Clear both buckets for `identity` unconditionally (admin use).
    pub fn reset(&self, identity: &str) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.minute_requests.remove(identity);
        inner.day_requests.remove(identity);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) >= window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

fn retry_after(oldest: Option<Instant>, now: Instant, window: Duration) -> u64 {
    let Some(oldest) = oldest else { return 1 };
    window.saturating_sub(now.duration_since(oldest)).as_secs() + 1
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
