use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::alerts::ScannerSettings;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot_token: String,

    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_lineup_path")]
    pub lineup_path: String,

    /// Lineup entries only carry month and day.
    #[serde(default = "default_festival_year")]
    pub festival_year: i32,

    /// Festival local time relative to UTC (CEST by default).
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    #[serde(default = "default_scan_interval")]
    pub scan_interval_seconds: u64,

    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_seconds: u64,

    #[serde(default = "default_max_concurrent_deliveries")]
    pub max_concurrent_deliveries: usize,

    /// Receive updates over HTTPS instead of long polling.
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Webhook mode is on only when both `domain` and `secret` are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Public base URL Telegram posts to, e.g. `https://bot.example.org`.
    #[serde(default)]
    pub domain: String,

    /// Sent back by Telegram in `X-Telegram-Bot-Api-Secret-Token`.
    #[serde(default)]
    pub secret: String,

    #[serde(default = "default_webhook_path")]
    pub path: String,

    #[serde(default = "default_webhook_listen_addr")]
    pub listen_addr: String,
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

fn default_webhook_listen_addr() -> String {
    "localhost:8080".to_string()
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            secret: String::new(),
            path: default_webhook_path(),
            listen_addr: default_webhook_listen_addr(),
        }
    }
}

impl WebhookConfig {
    pub fn enabled(&self) -> bool {
        !self.domain.trim().is_empty() && !self.secret.trim().is_empty()
    }

    /// The URL registered with `setWebhook`.
    pub fn url(&self) -> String {
        let domain = self.domain.trim().trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            format!("{}{}", domain, self.path)
        } else {
            format!("https://{}{}", domain, self.path)
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(AppError::Config(format!(
                "webhook path must start with '/': {:?}",
                self.path
            )));
        }
        // Telegram only accepts 1-256 characters from A-Z, a-z, 0-9, _ and -
        let valid_secret = self.secret.len() <= 256
            && self
                .secret
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_secret {
            return Err(AppError::Config(
                "webhook secret may only contain A-Z, a-z, 0-9, '_' and '-' (max 256)".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("festival-bot");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("alerts.db").to_string_lossy().to_string()
}

fn default_lineup_path() -> String {
    "data.json".to_string()
}

fn default_festival_year() -> i32 {
    2024
}

fn default_utc_offset_minutes() -> i32 {
    120
}

fn default_scan_interval() -> u64 {
    180
}

fn default_delivery_timeout() -> u64 {
    10
}

fn default_max_concurrent_deliveries() -> usize {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            db_path: default_db_path(),
            lineup_path: default_lineup_path(),
            festival_year: default_festival_year(),
            utc_offset_minutes: default_utc_offset_minutes(),
            scan_interval_seconds: default_scan_interval(),
            delivery_timeout_seconds: default_delivery_timeout(),
            max_concurrent_deliveries: default_max_concurrent_deliveries(),
            webhook: WebhookConfig::default(),
        }
    }
}

impl Config {
    /// Loads the config file (writing a default one if missing), then applies
    /// `BOTTOKEN`, `DB_FILE`, `LINEUP_FILE` and the `WEBHOOK_*` variables from
    /// the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            let config = Config::default();
            config.save(&config_path)?;
            config
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("festival-bot")
            .join("config.toml")
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("BOTTOKEN") {
            self.bot_token = token;
        }
        if let Some(db_path) = non_empty("DB_FILE") {
            self.db_path = db_path;
        }
        if let Some(lineup_path) = non_empty("LINEUP_FILE") {
            self.lineup_path = lineup_path;
        }
        if let Some(domain) = non_empty("WEBHOOK_DOMAIN") {
            self.webhook.domain = domain;
        }
        if let Some(secret) = non_empty("WEBHOOK_SECRET") {
            self.webhook.secret = secret;
        }
        if let Some(path) = non_empty("WEBHOOK_PATH") {
            self.webhook.path = path;
        }
        if let Some(listen_addr) = non_empty("WEBHOOK_LISTEN_ADDR") {
            self.webhook.listen_addr = listen_addr;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(AppError::Config(format!(
                "bot_token is not set (set BOTTOKEN or edit {:?})",
                Self::config_path()
            )));
        }
        if self.scan_interval_seconds == 0 {
            return Err(AppError::Config("scan_interval_seconds must be positive".to_string()));
        }
        if self.delivery_timeout_seconds == 0 {
            return Err(AppError::Config(
                "delivery_timeout_seconds must be positive".to_string(),
            ));
        }
        if self.webhook.enabled() {
            self.webhook.validate()?;
        }
        self.festival_offset()?;
        Ok(())
    }

    pub fn festival_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            AppError::Config(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ))
        })
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_seconds)
    }

    pub fn scanner_settings(&self) -> ScannerSettings {
        ScannerSettings {
            interval: Duration::from_secs(self.scan_interval_seconds),
            delivery_timeout: self.delivery_timeout(),
            max_concurrent_deliveries: self.max_concurrent_deliveries,
        }
    }
}
