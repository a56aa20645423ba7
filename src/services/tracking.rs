//! Website-visit tracking — persistence and browsing summaries.
//!
//! DESIGN
//! ======
//! The browser extension reports page visits as they happen and patches in
//! the dwell time when the tab closes. Summaries are computed in SQL so the
//! service stays stateless; only the domain extraction and duration
//! formatting live here, where they can be unit tested.

use sqlx::{PgPool, QueryBuilder};
use time::{Duration, OffsetDateTime, Time};

// =============================================================================
// TYPES
// =============================================================================

const MAX_URL_LENGTH: usize = 255;
const MAX_DOMAIN_LENGTH: usize = 50;

/// Top-domain rows returned in a browsing summary.
const TOP_DOMAINS_LIMIT: i64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("visit {0} not found")]
    VisitNotFound(i64),
}

/// Incoming visit event from the extension.
#[derive(Debug, serde::Deserialize)]
pub struct NewVisit {
    pub user_id: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub favicon_url: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub tab_id: Option<i32>,
    #[serde(default)]
    pub window_id: Option<i32>,
    #[serde(default)]
    pub duration_seconds: Option<i32>,
}

/// Row from `website_visits`.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct VisitRow {
    pub id: i64,
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub event_type: String,
    pub duration_seconds: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, serde::Serialize)]
pub struct DomainUsage {
    pub domain: String,
    pub visits: i64,
    pub total_seconds: i64,
    pub total_time: String,
}

#[derive(Debug, serde::Serialize)]
pub struct BrowsingSummary {
    pub total_visits: i64,
    pub unique_domains: i64,
    pub total_seconds: i64,
    pub total_time: String,
    pub top_domains: Vec<DomainUsage>,
    pub visits_by_day: Vec<(String, i64)>,
    pub visits_by_hour: Vec<(String, i64)>,
}

// =============================================================================
// URL HANDLING
// =============================================================================

/// Extract the host portion of a URL without pulling in a URL parser.
///
/// Handles scheme, userinfo, path, query, and fragment separators; anything
/// unparseable falls back to the (truncated) input so the visit is still
/// recorded.
pub fn extract_domain(url: &str) -> String {
    let without_scheme = match url.split_once("://") {
        Some((_, rest)) => rest,
        None => url,
    };
    let host_port = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme);
    // Drop userinfo if present (user:pass@host).
    let host = match host_port.rsplit_once('@') {
        Some((_, host)) => host,
        None => host_port,
    };
    truncate(host, MAX_DOMAIN_LENGTH)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_owned()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s[..end].to_owned()
    }
}

/// Render seconds as a compact human-readable duration.
#[must_use]
pub fn format_duration(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

// =============================================================================
// WRITES
// =============================================================================

/// Record a visit event, returning the new row ID and its timestamp.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn log_visit(pool: &PgPool, visit: &NewVisit) -> Result<(i64, OffsetDateTime), TrackingError> {
    let domain = extract_domain(&visit.url);
    let url = truncate(&visit.url, MAX_URL_LENGTH);
    let event_type = visit.event_type.as_deref().unwrap_or("page_visit");

    let row: (i64, OffsetDateTime) = sqlx::query_as(
        "INSERT INTO website_visits
             (user_id, url, domain, title, favicon_url, event_type, tab_id, window_id, duration_seconds)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING id, created_at",
    )
    .bind(&visit.user_id)
    .bind(url)
    .bind(domain)
    .bind(&visit.title)
    .bind(&visit.favicon_url)
    .bind(event_type)
    .bind(visit.tab_id)
    .bind(visit.window_id)
    .bind(visit.duration_seconds.unwrap_or(0))
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Patch the dwell time of an existing visit.
///
/// # Errors
///
/// Returns [`TrackingError::VisitNotFound`] if no row matches, or a
/// database error if the update fails.
pub async fn update_duration(pool: &PgPool, visit_id: i64, duration_seconds: i32) -> Result<(), TrackingError> {
    let result = sqlx::query("UPDATE website_visits SET duration_seconds = $1 WHERE id = $2")
        .bind(duration_seconds)
        .bind(visit_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(TrackingError::VisitNotFound(visit_id));
    }
    Ok(())
}

// =============================================================================
// READS
// =============================================================================

/// Paged visit history, newest first, optionally filtered by domain and a
/// trailing window of `days` (today counts as day one).
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn visit_history(
    pool: &PgPool,
    user_id: &str,
    domain: Option<&str>,
    days: Option<i64>,
    limit: i64,
    offset: i64,
) -> Result<Vec<VisitRow>, TrackingError> {
    let mut qb = QueryBuilder::new(
        "SELECT id, url, domain, title, event_type, duration_seconds, created_at \
         FROM website_visits WHERE user_id = ",
    );
    qb.push_bind(user_id);
    if let Some(domain) = domain {
        qb.push(" AND domain = ");
        qb.push_bind(domain);
    }
    if let Some(days) = days {
        qb.push(" AND created_at >= ");
        qb.push_bind(window_start(days));
    }
    qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);

    let rows = qb.build_query_as::<VisitRow>().fetch_all(pool).await?;
    Ok(rows)
}

/// Aggregate browsing activity for a user over a trailing window of `days`.
///
/// # Errors
///
/// Returns a database error if any of the aggregate queries fail.
pub async fn browsing_summary(pool: &PgPool, user_id: &str, days: i64) -> Result<BrowsingSummary, TrackingError> {
    let since = window_start(days);

    let (total_visits, unique_domains, total_seconds): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(DISTINCT domain), COALESCE(SUM(duration_seconds), 0)::BIGINT
         FROM website_visits WHERE user_id = $1 AND created_at >= $2",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await?;

    let domain_rows: Vec<(String, i64, i64)> = sqlx::query_as(
        "SELECT domain, COUNT(*), COALESCE(SUM(duration_seconds), 0)::BIGINT
         FROM website_visits WHERE user_id = $1 AND created_at >= $2
         GROUP BY domain
         ORDER BY COUNT(*) DESC, domain ASC
         LIMIT $3",
    )
    .bind(user_id)
    .bind(since)
    .bind(TOP_DOMAINS_LIMIT)
    .fetch_all(pool)
    .await?;

    let visits_by_day: Vec<(String, i64)> = sqlx::query_as(
        "SELECT to_char(created_at, 'YYYY-MM-DD'), COUNT(*)
         FROM website_visits WHERE user_id = $1 AND created_at >= $2
         GROUP BY 1 ORDER BY 1",
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    let visits_by_hour: Vec<(String, i64)> = sqlx::query_as(
        "SELECT to_char(created_at, 'HH24'), COUNT(*)
         FROM website_visits WHERE user_id = $1 AND created_at >= $2
         GROUP BY 1 ORDER BY 1",
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(BrowsingSummary {
        total_visits,
        unique_domains,
        total_seconds,
        total_time: format_duration(total_seconds),
        top_domains: domain_rows
            .into_iter()
            .map(|(domain, visits, total_seconds)| DomainUsage {
                domain,
                visits,
                total_seconds,
                total_time: format_duration(total_seconds),
            })
            .collect(),
        visits_by_day,
        visits_by_hour,
    })
}

/// Midnight UTC at the start of the window, so "1 day" means "today".
fn window_start(days: i64) -> OffsetDateTime {
    let midnight = OffsetDateTime::now_utc().replace_time(Time::MIDNIGHT);
    midnight - Duration::days(days.max(1) - 1)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "tracking_test.rs"]
mod tests;
