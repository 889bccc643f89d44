use std::path::PathBuf;
use std::sync::Arc;

mod alerts;
mod app;
mod bot;
mod config;
mod db;
mod error;
mod lineup;
mod models;
mod services;
mod webhook;

use alerts::{AlertService, ReminderScanner};
use app::App;
use config::Config;
use db::Repository;
use error::Result;
use services::TelegramClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (info and above unless RUST_LOG says otherwise)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let config_path = if args.len() >= 3 && args[1] == "--config" {
        Some(PathBuf::from(&args[2]))
    } else {
        None
    };

    // Load configuration
    let config = Config::load(config_path.as_deref())?;

    let lineup = Arc::new(lineup::load_lineup_file(
        &PathBuf::from(&config.lineup_path),
        config.festival_year,
        config.festival_offset()?,
    )?);

    let repository = Repository::new(&config.db_path).await?;
    tracing::info!(
        "Opened {} with {} pending reminders",
        config.db_path,
        repository.count().await?
    );

    let telegram = Arc::new(TelegramClient::new(
        &config.bot_token,
        config.delivery_timeout(),
    )?);

    // Background delivery of due reminders
    let scanner = ReminderScanner::new(
        repository.clone(),
        telegram.clone(),
        config.scanner_settings(),
    );
    let _scanner = scanner.run();

    let alerts = AlertService::new(repository, Arc::clone(&lineup));
    let app = Arc::new(App::new(lineup, alerts, telegram.clone()));

    if config.webhook.enabled() {
        webhook::serve(app, telegram, &config.webhook).await
    } else {
        app.run_polling(telegram).await
    }
}
