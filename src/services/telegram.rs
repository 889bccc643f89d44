use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::{BotTransport, Notifier};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Seconds Telegram holds a `getUpdates` request open.
pub const LONG_POLL_SECONDS: u64 = 9;

const ALLOWED_UPDATES: [&str; 2] = ["message", "callback_query"];

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(AppError::Telegram(format!(
                "{}: {}",
                method,
                self.description.unwrap_or_else(|| "no result returned".to_string())
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Serialize)]
pub struct BotCommand {
    pub command: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 2],
}

#[derive(Debug, Serialize)]
struct SetWebhookRequest<'a> {
    url: &'a str,
    secret_token: &'a str,
    max_connections: u32,
    drop_pending_updates: bool,
    allowed_updates: [&'static str; 2],
}

#[derive(Debug, Serialize)]
struct DeleteWebhookRequest {
    drop_pending_updates: bool,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct EditMessageTextRequest<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackQueryRequest<'a> {
    callback_query_id: &'a str,
}

#[derive(Debug, Serialize)]
struct SetMyCommandsRequest<'a> {
    commands: &'a [BotCommand],
}

/// Minimal Telegram Bot API client for long polling or webhook delivery.
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("festival-bot/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", TELEGRAM_API_URL, token),
        })
    }

    async fn call<P, T>(&self, method: &str, params: &P, timeout: Option<Duration>) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(params);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        // Telegram reports failures in the body, so the status code alone says little
        let response: ApiResponse<T> = request.send().await?.json().await?;
        response.into_result(method)
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: ALLOWED_UPDATES,
        };
        self.call(
            "getUpdates",
            &request,
            Some(Duration::from_secs(timeout_secs + 5)),
        )
        .await
    }

    /// Removes any registered webhook so `getUpdates` can be used.
    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<()> {
        let request = DeleteWebhookRequest {
            drop_pending_updates,
        };
        let _: bool = self.call("deleteWebhook", &request, None).await?;
        Ok(())
    }

    /// Registers `url`; Telegram echoes `secret_token` on every delivery.
    pub async fn set_webhook(&self, url: &str, secret_token: &str) -> Result<()> {
        let request = SetWebhookRequest {
            url,
            secret_token,
            max_connections: 100,
            drop_pending_updates: false,
            allowed_updates: ALLOWED_UPDATES,
        };
        let _: bool = self.call("setWebhook", &request, None).await?;
        Ok(())
    }
}

#[async_trait]
impl BotTransport for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<&'static str>,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode,
            reply_markup,
        };
        let _: Message = self.call("sendMessage", &request, None).await?;
        Ok(())
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        let request = EditMessageTextRequest {
            chat_id,
            message_id,
            text,
            parse_mode: "HTML",
            reply_markup,
        };
        let _: serde_json::Value = self.call("editMessageText", &request, None).await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()> {
        let request = AnswerCallbackQueryRequest { callback_query_id };
        let _: bool = self.call("answerCallbackQuery", &request, None).await?;
        Ok(())
    }

    async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<()> {
        let request = SetMyCommandsRequest { commands };
        let _: bool = self.call("setMyCommands", &request, None).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send(&self, subscriber: i64, text: &str) -> Result<()> {
        self.send_message(subscriber, text, None, None).await
    }
}
