use crate::models::LeadTime;
use crate::services::telegram::Update;

/// Where a button press came from, so the reply can edit that message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRef {
    pub query_id: String,
    pub chat_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotAction {
    Start { chat_id: i64 },
    Today { chat_id: i64 },
    Timetable { chat_id: i64 },
    Alerts { chat_id: i64 },
    ShowDay { callback: CallbackRef, day: usize },
    ShowPerformance { callback: CallbackRef, performance: usize },
    ToggleReminder {
        callback: CallbackRef,
        performance: usize,
        lead: LeadTime,
        enable: bool,
    },
    Back { callback: CallbackRef },
    // Pressed button we no longer understand; only acknowledged
    Unknown { callback: CallbackRef },
}

pub fn alert_callback_data(enable: bool, lead: LeadTime, performance: usize) -> String {
    let action = if enable { "a" } else { "d" };
    format!("alert_{}_{}_{}", action, lead.token(), performance)
}

pub fn parse_update(update: &Update) -> Option<BotAction> {
    if let Some(message) = &update.message {
        let text = message.text.as_deref()?;
        return parse_command(text, message.chat.id);
    }

    let query = update.callback_query.as_ref()?;
    let message = query.message.as_ref()?;
    let callback = CallbackRef {
        query_id: query.id.clone(),
        chat_id: message.chat.id,
        message_id: message.message_id,
    };
    let data = query.data.as_deref().unwrap_or_default();
    Some(parse_callback(data, callback))
}

fn parse_command(text: &str, chat_id: i64) -> Option<BotAction> {
    let command = text.split_whitespace().next()?.strip_prefix('/')?;
    // "/today@festival_bot" in group chats
    let command = command.split('@').next().unwrap_or(command);

    match command {
        "start" => Some(BotAction::Start { chat_id }),
        "today" => Some(BotAction::Today { chat_id }),
        "timetable" => Some(BotAction::Timetable { chat_id }),
        "alerts" => Some(BotAction::Alerts { chat_id }),
        _ => None,
    }
}

fn parse_callback(data: &str, callback: CallbackRef) -> BotAction {
    if data == "back" {
        return BotAction::Back { callback };
    }
    if let Some(day) = data.strip_prefix("day_").and_then(|s| s.parse().ok()) {
        return BotAction::ShowDay { callback, day };
    }
    if let Some(performance) = data.strip_prefix("band_").and_then(|s| s.parse().ok()) {
        return BotAction::ShowPerformance {
            callback,
            performance,
        };
    }
    if let Some(rest) = data.strip_prefix("alert_") {
        let mut parts = rest.splitn(3, '_');
        let enable = match parts.next() {
            Some("a") => Some(true),
            Some("d") => Some(false),
            _ => None,
        };
        let lead = parts.next().and_then(LeadTime::from_token);
        let performance = parts.next().and_then(|s| s.parse().ok());

        if let (Some(enable), Some(lead), Some(performance)) = (enable, lead, performance) {
            return BotAction::ToggleReminder {
                callback,
                performance,
                lead,
                enable,
            };
        }
    }

    BotAction::Unknown { callback }
}
