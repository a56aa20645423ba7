//! In-memory usage analytics for the chat assistant.
//!
//! DESIGN
//! ======
//! One mutex guards all counters; every mutating operation is a single
//! critical section. State is process-scoped: counters reset on restart.
//! Day buckets are keyed by UTC calendar date. Per-day identity counts keep
//! first-seen insertion order so the daily top-10 tie-break is stable.
//! Response-time samples are pruned to a trailing 24h window on every
//! insert, which bounds memory without a background sweeper.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use time::{Date, OffsetDateTime};

const SAMPLE_WINDOW: Duration = Duration::from_secs(86_400);
const TOP_USERS_LIMIT: usize = 10;

// =============================================================================
// SNAPSHOT TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct UserStats {
    pub messages_today: u64,
    pub total_messages: u64,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct SystemStats {
    pub total_messages: u64,
    pub messages_today: u64,
    pub unique_users_today: usize,
    pub total_errors: u64,
    pub errors_today: u64,
    pub avg_response_time_ms: f64,
    pub response_samples: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DailyReport {
    pub date: String,
    pub total_messages: u64,
    pub unique_users: usize,
    pub errors: u64,
    /// Top identities by message count, ties kept in first-seen order.
    pub top_users: Vec<(String, u64)>,
}

// =============================================================================
// AGGREGATOR
// =============================================================================

#[derive(Clone)]
pub struct Analytics {
    inner: Arc<Mutex<AnalyticsInner>>,
}

struct AnalyticsInner {
    /// Per-day message counts by identity.
    daily_messages: HashMap<Date, DayBucket>,
    /// Response-time samples inside the trailing 24h, in arrival order.
    response_times: VecDeque<(Instant, f64)>,
    /// Per-day error counts.
    daily_errors: HashMap<Date, u64>,
    total_messages: u64,
    total_errors: u64,
}

/// Message counts for one day, preserving first-seen identity order.
#[derive(Default)]
struct DayBucket {
    counts: HashMap<String, u64>,
    order: Vec<String>,
}

impl DayBucket {
    fn increment(&mut self, identity: &str) {
        if !self.counts.contains_key(identity) {
            self.order.push(identity.to_owned());
        }
        *self.counts.entry(identity.to_owned()).or_insert(0) += 1;
    }

    fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

impl Analytics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(AnalyticsInner {
                daily_messages: HashMap::new(),
                response_times: VecDeque::new(),
                daily_errors: HashMap::new(),
                total_messages: 0,
                total_errors: 0,
            })),
        }
    }

    /// Count one message from `identity` against today's bucket.
    pub fn track_message(&self, identity: &str) {
        self.track_message_on(identity, today_utc());
    }

    fn track_message_on(&self, identity: &str, date: Date) {
        let mut inner = self.lock();
        inner.daily_messages.entry(date).or_default().increment(identity);
        inner.total_messages += 1;
    }

    /// Record a response-time sample and drop samples older than 24h.
    pub fn track_response_time(&self, duration_ms: f64) {
        self.track_response_time_at(duration_ms, Instant::now());
    }

    fn track_response_time_at(&self, duration_ms: f64, now: Instant) {
        let mut inner = self.lock();
        inner.response_times.push_back((now, duration_ms));
        while let Some(&(front, _)) = inner.response_times.front() {
            if now.duration_since(front) >= SAMPLE_WINDOW {
                inner.response_times.pop_front();
            } else {
                break;
            }
        }
    }

    /// Count one error. The kind is emitted as a log field but errors are
    /// aggregated coarsely, one counter per day.
    pub fn track_error(&self, kind: &str) {
        tracing::debug!(%kind, "tracked error");
        self.track_error_on(today_utc());
    }

    fn track_error_on(&self, date: Date) {
        let mut inner = self.lock();
        *inner.daily_errors.entry(date).or_insert(0) += 1;
        inner.total_errors += 1;
    }

    #[must_use]
    pub fn user_stats(&self, identity: &str) -> UserStats {
        self.user_stats_on(identity, today_utc())
    }

    fn user_stats_on(&self, identity: &str, today: Date) -> UserStats {
        let inner = self.lock();
        let messages_today = inner
            .daily_messages
            .get(&today)
            .and_then(|bucket| bucket.counts.get(identity))
            .copied()
            .unwrap_or(0);
        let total_messages = inner
            .daily_messages
            .values()
            .filter_map(|bucket| bucket.counts.get(identity))
            .sum();
        UserStats { messages_today, total_messages }
    }

    #[must_use]
    pub fn system_stats(&self) -> SystemStats {
        self.system_stats_on(today_utc())
    }

    fn system_stats_on(&self, today: Date) -> SystemStats {
        let inner = self.lock();
        let today_bucket = inner.daily_messages.get(&today);

        let avg_response_time_ms = if inner.response_times.is_empty() {
            0.0
        } else {
            let sum: f64 = inner.response_times.iter().map(|(_, ms)| ms).sum();
            round2(sum / inner.response_times.len() as f64)
        };

        SystemStats {
            total_messages: inner.total_messages,
            messages_today: today_bucket.map_or(0, DayBucket::total),
            unique_users_today: today_bucket.map_or(0, |b| b.counts.len()),
            total_errors: inner.total_errors,
            errors_today: inner.daily_errors.get(&today).copied().unwrap_or(0),
            avg_response_time_ms,
            response_samples: inner.response_times.len(),
        }
    }

    /// Usage report for one day; defaults to today.
    #[must_use]
    pub fn daily_report(&self, date: Option<Date>) -> DailyReport {
        self.daily_report_on(date.unwrap_or_else(today_utc))
    }

    fn daily_report_on(&self, date: Date) -> DailyReport {
        let inner = self.lock();
        let bucket = inner.daily_messages.get(&date);

        let top_users = bucket.map_or_else(Vec::new, |bucket| {
            let mut users: Vec<(String, u64)> = bucket
                .order
                .iter()
                .map(|identity| {
                    let count = bucket.counts.get(identity).copied().unwrap_or(0);
                    (identity.clone(), count)
                })
                .collect();
            // Stable sort: equal counts keep first-seen insertion order.
            users.sort_by(|a, b| b.1.cmp(&a.1));
            users.truncate(TOP_USERS_LIMIT);
            users
        });

        DailyReport {
            date: date.to_string(),
            total_messages: bucket.map_or(0, DayBucket::total),
            unique_users: bucket.map_or(0, |b| b.counts.len()),
            errors: inner.daily_errors.get(&date).copied().unwrap_or(0),
            top_users,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AnalyticsInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for Analytics {
    fn default() -> Self {
        Self::new()
    }
}

fn today_utc() -> Date {
    OffsetDateTime::now_utc().date()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// =============================================================================
// RESPONSE TIMER
// =============================================================================

/// Scoped wall-clock measurement around an AI call.
///
/// `finish` reports the elapsed time and hands it back for the response
/// payload. If the timer is dropped without finishing (an early `?` exit
/// somewhere inside the scope), the `Drop` impl still reports the duration
/// and counts an error, so no exit path escapes measurement. The original
/// failure is never swallowed; the timer only observes.
pub struct ResponseTimer {
    analytics: Analytics,
    start: Instant,
    finished: bool,
}

impl ResponseTimer {
    #[must_use]
    pub fn start(analytics: &Analytics) -> Self {
        Self {
            analytics: analytics.clone(),
            start: Instant::now(),
            finished: false,
        }
    }

    /// Complete the scope successfully. Reports the sample and returns the
    /// elapsed milliseconds.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn finish(mut self) -> u64 {
        let ms = self.elapsed_ms();
        self.analytics.track_response_time(ms);
        self.finished = true;
        ms as u64
    }

    /// Complete the scope as failed: reports the sample and counts an error.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn fail(mut self, kind: &str) -> u64 {
        let ms = self.elapsed_ms();
        self.analytics.track_response_time(ms);
        self.analytics.track_error(kind);
        self.finished = true;
        ms as u64
    }

    #[allow(clippy::cast_precision_loss)]
    fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for ResponseTimer {
    fn drop(&mut self) {
        if !self.finished {
            self.analytics.track_response_time(self.elapsed_ms());
            self.analytics.track_error("aborted_scope");
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "analytics_test.rs"]
mod tests;
