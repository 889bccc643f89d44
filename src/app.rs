use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::alerts::AlertService;
use crate::bot::handler::{parse_update, BotAction, CallbackRef};
use crate::bot::ui;
use crate::error::{AppError, Result};
use crate::lineup::Lineup;
use crate::models::Performance;
use crate::services::telegram::{BotCommand, InlineKeyboardMarkup, Update, LONG_POLL_SECONDS};
use crate::services::{BotTransport, TelegramClient};

const COMMANDS: [BotCommand; 3] = [
    BotCommand {
        command: "today",
        description: "Get todays timetable",
    },
    BotCommand {
        command: "timetable",
        description: "Get the timetable",
    },
    BotCommand {
        command: "alerts",
        description: "Manage your alerts",
    },
];

/// Wait before polling again after `getUpdates` fails.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);

pub struct App {
    lineup: Arc<Lineup>,
    alerts: AlertService,
    transport: Arc<dyn BotTransport>,
}

impl App {
    pub fn new(lineup: Arc<Lineup>, alerts: AlertService, transport: Arc<dyn BotTransport>) -> Self {
        Self {
            lineup,
            alerts,
            transport,
        }
    }

    /// Long-polls Telegram forever. Updates queued while the bot was offline
    /// are dropped.
    pub async fn run_polling(self: Arc<Self>, telegram: Arc<TelegramClient>) -> Result<()> {
        telegram.delete_webhook(true).await?;
        let mut offset = 0;
        tracing::info!("Bot has been started, polling for updates");

        loop {
            let updates = match telegram.get_updates(offset, LONG_POLL_SECONDS).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!("Failed to poll updates: {}", e);
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                self.dispatch(&update);
            }
        }
    }

    /// Handles one update on its own task.
    pub fn dispatch(self: &Arc<Self>, update: &Update) {
        let Some(action) = parse_update(update) else {
            return;
        };

        let app = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = app.handle_action(action).await {
                tracing::error!("An error occurred while handling update: {}", e);
            }
        });
    }

    pub async fn handle_action(&self, action: BotAction) -> Result<()> {
        match action {
            BotAction::Start { chat_id } => {
                self.transport
                    .send_message(chat_id, ui::GREETING, None, None)
                    .await?;
                self.transport.set_my_commands(&COMMANDS).await?;
            }

            BotAction::Today { chat_id } => {
                let now = Utc::now();
                let text = match self.lineup.today(now) {
                    Some(day) => {
                        ui::render_day(day, self.lineup.offset(), self.lineup.now_playing(now))
                    }
                    None => ui::NO_PERFORMANCES_TODAY.to_string(),
                };
                self.transport
                    .send_message(chat_id, &text, Some("HTML"), None)
                    .await?;
            }

            BotAction::Timetable { chat_id } => {
                let text = ui::render_timetable(&self.lineup, Utc::now());
                self.transport
                    .send_message(chat_id, &text, Some("HTML"), None)
                    .await?;
            }

            BotAction::Alerts { chat_id } => {
                let keyboard = ui::day_keyboard(&self.lineup);
                self.transport
                    .send_message(chat_id, ui::DAY_PROMPT, None, Some(&keyboard))
                    .await?;
            }

            BotAction::Back { callback } => {
                self.transport.answer_callback_query(&callback.query_id).await?;
                let keyboard = ui::day_keyboard(&self.lineup);
                self.edit(&callback, ui::DAY_PROMPT, &keyboard).await?;
            }

            BotAction::ShowDay { callback, day } => {
                self.transport.answer_callback_query(&callback.query_id).await?;
                let Some(day) = self.lineup.days().get(day) else {
                    tracing::warn!("Callback for unknown festival day {}", day);
                    return Ok(());
                };
                let keyboard = ui::performance_keyboard(day, self.lineup.offset());
                self.edit(&callback, ui::PERFORMANCE_PROMPT, &keyboard).await?;
            }

            BotAction::ShowPerformance {
                callback,
                performance,
            } => {
                self.transport.answer_callback_query(&callback.query_id).await?;
                let performance = self.performance(performance)?;
                let enabled = self
                    .alerts
                    .current_reminders(callback.chat_id, &performance.name)
                    .await?;
                self.edit(
                    &callback,
                    &ui::reminder_title(performance),
                    &ui::reminder_keyboard(performance.id, &enabled),
                )
                .await?;
            }

            BotAction::ToggleReminder {
                callback,
                performance,
                lead,
                enable,
            } => {
                self.transport.answer_callback_query(&callback.query_id).await?;
                let performance = self.performance(performance)?;
                // On failure the keyboard is left untouched
                let enabled = self
                    .alerts
                    .set_reminder(callback.chat_id, &performance.name, lead, enable)
                    .await?;
                self.edit(
                    &callback,
                    &ui::reminder_title(performance),
                    &ui::reminder_keyboard(performance.id, &enabled),
                )
                .await?;
            }

            BotAction::Unknown { callback } => {
                self.transport.answer_callback_query(&callback.query_id).await?;
            }
        }

        Ok(())
    }

    fn performance(&self, id: usize) -> Result<&Performance> {
        self.lineup
            .performance(id)
            .ok_or_else(|| AppError::UnknownPerformance(format!("#{id}")))
    }

    async fn edit(
        &self,
        callback: &CallbackRef,
        text: &str,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<()> {
        match self
            .transport
            .edit_message_text(callback.chat_id, callback.message_id, text, Some(keyboard))
            .await
        {
            // Stale keyboard pressed; the message already shows this state
            Err(e) if e.is_message_not_modified() => {
                tracing::debug!("Message {} already up to date", callback.message_id);
                Ok(())
            }
            result => result,
        }
    }
}


#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tokio_test::{assert_err, assert_ok};

    use super::testing::{test_bot, Call};
    use super::*;
    use crate::models::{LeadTime, NewSubscription};

    fn callback() -> CallbackRef {
        CallbackRef {
            query_id: "q".to_string(),
            chat_id: 42,
            message_id: 10,
        }
    }

    fn toggle(lead: LeadTime, enable: bool) -> BotAction {
        BotAction::ToggleReminder {
            callback: callback(),
            performance: 0,
            lead,
            enable,
        }
    }

    fn reminder_edit(enabled: &[LeadTime]) -> Call {
        Call::Edit {
            chat_id: 42,
            message_id: 10,
            text: "🔔 Trigger alerts for \"Alpha\"".to_string(),
            keyboard: Some(ui::reminder_keyboard(0, enabled)),
        }
    }

    #[tokio::test]
    async fn toggle_renders_state_read_back_from_store() {
        let bot = test_bot().await;
        // enabled earlier, not part of this intent
        bot.repository
            .create_subscription(NewSubscription {
                subscriber: 42,
                performance: "Alpha".to_string(),
                lead: LeadTime::Min5,
                due_at: Utc.with_ymd_and_hms(2024, 8, 15, 20, 0, 0).unwrap(),
            })
            .await
            .unwrap();

        assert_ok!(bot.app.handle_action(toggle(LeadTime::Min30, true)).await);

        assert_eq!(
            bot.transport.calls(),
            vec![
                Call::Answer("q".to_string()),
                reminder_edit(&[LeadTime::Min5, LeadTime::Min30]),
            ]
        );
    }

    #[tokio::test]
    async fn failed_toggle_leaves_message_untouched() {
        let bot = test_bot().await;
        rusqlite::Connection::open(&bot.db_path)
            .unwrap()
            .execute_batch("DROP TABLE alerts")
            .unwrap();

        assert_err!(bot.app.handle_action(toggle(LeadTime::Min30, true)).await);

        assert_eq!(bot.transport.calls(), vec![Call::Answer("q".to_string())]);
    }

    #[tokio::test]
    async fn unknown_performance_leaves_message_untouched() {
        let bot = test_bot().await;

        let err = assert_err!(
            bot.app
                .handle_action(BotAction::ToggleReminder {
                    callback: callback(),
                    performance: 99,
                    lead: LeadTime::Min5,
                    enable: true,
                })
                .await
        );

        assert!(matches!(err, AppError::UnknownPerformance(_)));
        assert_eq!(bot.transport.calls(), vec![Call::Answer("q".to_string())]);
        assert_eq!(bot.repository.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stale_keyboard_press_is_not_an_error() {
        let bot = test_bot().await;
        assert_ok!(bot.app.handle_action(toggle(LeadTime::Hour1, true)).await);
        bot.transport
            .fail_edits_with("Bad Request: message is not modified: specified new message content and reply markup are exactly the same");

        assert_ok!(bot.app.handle_action(toggle(LeadTime::Hour1, true)).await);
        assert_eq!(
            bot.repository
                .find_by_subscriber_and_performance(42, "Alpha")
                .await
                .unwrap(),
            vec![LeadTime::Hour1]
        );
    }

    #[tokio::test]
    async fn other_edit_failures_are_reported() {
        let bot = test_bot().await;
        bot.transport.fail_edits_with("Bad Request: message to edit not found");

        assert_err!(bot.app.handle_action(toggle(LeadTime::Hour1, true)).await);
    }

    #[tokio::test]
    async fn show_performance_lists_current_reminders() {
        let bot = test_bot().await;
        assert_ok!(bot.app.handle_action(toggle(LeadTime::Hour2, true)).await);

        assert_ok!(
            bot.app
                .handle_action(BotAction::ShowPerformance {
                    callback: callback(),
                    performance: 0,
                })
                .await
        );

        let calls = bot.transport.calls();
        assert_eq!(calls.last(), Some(&reminder_edit(&[LeadTime::Hour2])));
    }

    #[tokio::test]
    async fn start_greets_and_registers_commands() {
        let bot = test_bot().await;

        assert_ok!(bot.app.handle_action(BotAction::Start { chat_id: 42 }).await);

        assert_eq!(
            bot.transport.calls(),
            vec![
                Call::Send {
                    chat_id: 42,
                    text: ui::GREETING.to_string(),
                },
                Call::Commands,
            ]
        );
    }
}
