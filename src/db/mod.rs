//! Postgres pool setup and schema migrations.
//!
//! SYSTEM CONTEXT
//! ==============
//! The durable side of the service: chat transcripts and website visits
//! outlive the process, unlike the in-memory limiter and analytics. The
//! schema lives in `src/db/migrations` and is applied at startup, before
//! the router accepts traffic, so handlers can assume the `users`,
//! `chat_messages`, and `website_visits` tables exist.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::Config;

/// Connect the shared pool and bring the schema up to date.
///
/// # Errors
///
/// Returns an error if the connection or a migration fails.
pub async fn init_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;

    Ok(pool)
}
