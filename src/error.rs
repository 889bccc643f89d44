use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("lineup error: {0}")]
    Lineup(String),

    #[error("unknown performance: {0:?}")]
    UnknownPerformance(String),

    #[error("telegram api error: {0}")]
    Telegram(String),

    #[error("delivery timed out after {0:?}")]
    DeliveryTimeout(std::time::Duration),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Telegram refuses edits that would leave a message unchanged.
    pub fn is_message_not_modified(&self) -> bool {
        matches!(self, AppError::Telegram(msg) if msg.contains("message is not modified"))
    }
}
