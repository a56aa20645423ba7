//! Chat persistence — message storage, history, stats queries.
//!
//! DESIGN
//! ======
//! The transcript is the durable record; in-memory analytics only hold the
//! current process's counters. Messages are stored as they flow through the
//! chat route: the user's message before the AI call, the assistant's reply
//! (with timing and token metadata) after it.

use sqlx::{PgPool, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::services::assistant::Turn;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Row from `chat_messages`.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct ChatMessageRow {
    pub chat_id: i64,
    pub message_id: Uuid,
    pub session_id: Option<String>,
    pub message_type: String,
    pub message_text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub response_time_ms: Option<i32>,
    pub tokens_used: Option<i32>,
}

/// Row from `users`.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct UserRow {
    pub user_id: String,
    pub session_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_active: OffsetDateTime,
}

pub struct NewMessage<'a> {
    pub user_id: &'a str,
    pub session_id: &'a str,
    /// `"user"` or `"assistant"`.
    pub message_type: &'a str,
    pub message_text: &'a str,
    pub response_time_ms: Option<i32>,
    pub tokens_used: Option<i32>,
}

// =============================================================================
// WRITES
// =============================================================================

/// Insert the user row if absent; touch `last_active` otherwise.
///
/// # Errors
///
/// Returns a database error if the upsert fails.
pub async fn ensure_user(pool: &PgPool, user_id: &str, session_id: &str) -> Result<(), ChatError> {
    sqlx::query(
        "INSERT INTO users (user_id, session_id) VALUES ($1, $2)
         ON CONFLICT (user_id) DO UPDATE SET last_active = now()",
    )
    .bind(user_id)
    .bind(session_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Store one transcript message, returning its generated message ID.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn store_message(pool: &PgPool, message: &NewMessage<'_>) -> Result<Uuid, ChatError> {
    let message_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO chat_messages
             (user_id, session_id, message_id, message_type, message_text, response_time_ms, tokens_used)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(message.user_id)
    .bind(message.session_id)
    .bind(message_id)
    .bind(message.message_type)
    .bind(message.message_text)
    .bind(message.response_time_ms)
    .bind(message.tokens_used)
    .execute(pool)
    .await?;
    Ok(message_id)
}

// =============================================================================
// READS
// =============================================================================

/// Transcript for a user in chronological order, optionally filtered by
/// session and capped at `limit` (uncapped when `None`, for exports).
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn fetch_history(
    pool: &PgPool,
    user_id: &str,
    session_id: Option<&str>,
    limit: Option<i64>,
) -> Result<Vec<ChatMessageRow>, ChatError> {
    let mut qb = QueryBuilder::new(
        "SELECT chat_id, message_id, session_id, message_type, message_text, created_at, \
                response_time_ms, tokens_used \
         FROM chat_messages WHERE user_id = ",
    );
    qb.push_bind(user_id);
    if let Some(session_id) = session_id {
        qb.push(" AND session_id = ");
        qb.push_bind(session_id);
    }
    qb.push(" ORDER BY created_at ASC, chat_id ASC");
    if let Some(limit) = limit {
        qb.push(" LIMIT ");
        qb.push_bind(limit);
    }

    let rows = qb.build_query_as::<ChatMessageRow>().fetch_all(pool).await?;
    Ok(rows)
}

/// Most recent `limit` turns of a session in chronological order, for
/// prompt context.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn conversation_history(
    pool: &PgPool,
    user_id: &str,
    session_id: &str,
    limit: i64,
) -> Result<Vec<Turn>, ChatError> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT message_type, message_text FROM chat_messages
         WHERE user_id = $1 AND session_id = $2
         ORDER BY created_at DESC, chat_id DESC
         LIMIT $3",
    )
    .bind(user_id)
    .bind(session_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    // Rows arrive newest-first; the prompt wants oldest-first.
    Ok(rows
        .into_iter()
        .rev()
        .map(|(role, text)| Turn { role, text })
        .collect())
}

/// Number of user-authored messages stored for `user_id`.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn count_user_messages(pool: &PgPool, user_id: &str) -> Result<i64, ChatError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM chat_messages WHERE user_id = $1 AND message_type = 'user'",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Look up a user row.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn find_user(pool: &PgPool, user_id: &str) -> Result<Option<UserRow>, ChatError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT user_id, session_id, created_at, last_active FROM users WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Most recent messages for a user, newest first (debug views).
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn recent_messages(pool: &PgPool, user_id: &str, limit: i64) -> Result<Vec<ChatMessageRow>, ChatError> {
    let rows = sqlx::query_as::<_, ChatMessageRow>(
        "SELECT chat_id, message_id, session_id, message_type, message_text, created_at, \
                response_time_ms, tokens_used \
         FROM chat_messages WHERE user_id = $1
         ORDER BY created_at DESC, chat_id DESC
         LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
