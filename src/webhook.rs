use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};

use crate::app::App;
use crate::config::WebhookConfig;
use crate::error::Result;
use crate::services::telegram::Update;
use crate::services::TelegramClient;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
struct WebhookState {
    app: Arc<App>,
    secret: Arc<str>,
}

/// Serves Telegram webhook deliveries on `config.path` until the listener fails.
pub async fn serve(app: Arc<App>, telegram: Arc<TelegramClient>, config: &WebhookConfig) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    let local_addr = listener.local_addr()?;

    telegram.set_webhook(&config.url(), &config.secret).await?;
    tracing::info!(
        "Bot has been started, receiving updates for {} on http://{}{}",
        config.url(),
        local_addr,
        config.path
    );

    axum::serve(listener, router(app, &config.path, &config.secret)).await?;
    Ok(())
}

fn router(app: Arc<App>, path: &str, secret: &str) -> Router {
    let state = WebhookState {
        app,
        secret: Arc::from(secret),
    };
    Router::new()
        .route(path, post(receive_update))
        .with_state(state)
}

fn secret_is_valid(headers: &HeaderMap, expected: &str) -> bool {
    let candidate = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    !expected.is_empty() && candidate == expected
}

async fn receive_update(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> StatusCode {
    if !secret_is_valid(&headers, &state.secret) {
        tracing::warn!("Rejected webhook delivery {} with a bad secret", update.update_id);
        return StatusCode::UNAUTHORIZED;
    }

    // Telegram only needs an acknowledgement; handling errors are logged
    state.app.dispatch(&update);
    StatusCode::OK
}
