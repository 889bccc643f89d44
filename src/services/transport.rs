use async_trait::async_trait;

use crate::error::Result;

use super::telegram::{BotCommand, InlineKeyboardMarkup};

/// The chat operations the bot needs to answer users.
#[async_trait]
pub trait BotTransport: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<&'static str>,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()>;

    /// Replaces the text and keyboard of a message the bot sent earlier.
    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()>;

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()>;

    async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<()>;
}
