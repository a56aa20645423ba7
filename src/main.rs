mod analytics;
mod config;
mod db;
mod llm;
mod rate_limit;
mod routes;
mod services;
mod state;
mod validate;

use std::sync::Arc;

use crate::llm::{GeminiClient, GenerateText};
use crate::services::assistant::Assistant;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env();

    let pool = db::init_pool(&config)
        .await
        .expect("database init failed");

    // Gemini client is optional: chat degrades to a fixed instructional
    // reply when no API key is configured.
    let gemini: Option<Arc<dyn GenerateText>> = match &config.gemini_api_key {
        Some(api_key) => match GeminiClient::new(api_key.clone(), config.gemini_model.clone()) {
            Ok(client) => {
                tracing::info!(model = %config.gemini_model, "Gemini client initialized");
                Some(Arc::new(client))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Gemini client init failed; AI replies disabled");
                None
            }
        },
        None => {
            tracing::warn!("GEMINI_API_KEY not configured; AI replies disabled");
            None
        }
    };

    let state = state::AppState::new(pool, Assistant::new(gemini));

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "saleshub backend listening");
    // Client addresses back the rate limiter for anonymous callers.
    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .await
        .expect("server failed");
}
