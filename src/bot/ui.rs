use chrono::{DateTime, FixedOffset, Utc};

use crate::lineup::Lineup;
use crate::models::{FestivalDay, LeadTime, Performance};
use crate::services::telegram::{InlineKeyboardButton, InlineKeyboardMarkup};

use super::handler::alert_callback_data;

pub const GREETING: &str =
    "👋 Hey,\nUse /today to get todays timetable\nUse /alerts to manage your alerts";
pub const NO_PERFORMANCES_TODAY: &str = "No bands today 😞";
pub const DAY_PROMPT: &str = "📅 For which day would you like to manage your alerts?";
pub const PERFORMANCE_PROMPT: &str = "🤘 Select the band.";

const DAY_FORMAT: &str = "%A, %B %d";
const TIME_FORMAT: &str = "%H:%M";
const NOW_PLAYING_MARKER: &str = "🎸 ";
const NO_MARKER: &str = "      ";

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn local_time(performance: &Performance, offset: FixedOffset) -> String {
    performance.start.with_timezone(&offset).format(TIME_FORMAT).to_string()
}

pub fn day_label(day: &FestivalDay) -> String {
    day.date.format(DAY_FORMAT).to_string()
}

/// Renders one day; `playing` gets the now-playing marker.
pub fn render_day(day: &FestivalDay, offset: FixedOffset, playing: Option<&Performance>) -> String {
    let playing = playing.map(|p| p.id);

    let mut msg = String::new();
    msg.push_str("📅 ");
    msg.push_str(&day_label(day));
    msg.push('\n');
    msg.push_str("--------------------\n");

    for performance in &day.performances {
        msg.push_str(if playing == Some(performance.id) {
            NOW_PLAYING_MARKER
        } else {
            NO_MARKER
        });
        msg.push_str(&local_time(performance, offset));
        msg.push_str("  ");
        msg.push_str(&escape_html(&performance.name));
        msg.push_str(" (");
        msg.push_str(&escape_html(&performance.stage_initial().to_string()));
        msg.push_str(")\n");
    }
    msg
}

pub fn render_timetable(lineup: &Lineup, now: DateTime<Utc>) -> String {
    let playing = lineup.now_playing(now);
    lineup
        .days()
        .iter()
        .map(|day| render_day(day, lineup.offset(), playing))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn reminder_title(performance: &Performance) -> String {
    format!("🔔 Trigger alerts for \"{}\"", escape_html(&performance.name))
}

fn button(text: impl Into<String>, callback_data: impl Into<String>) -> InlineKeyboardButton {
    InlineKeyboardButton {
        text: text.into(),
        callback_data: callback_data.into(),
    }
}

fn back_row() -> Vec<InlineKeyboardButton> {
    vec![button("🔙 Back", "back")]
}

pub fn day_keyboard(lineup: &Lineup) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: lineup
            .days()
            .iter()
            .enumerate()
            .map(|(i, day)| vec![button(day_label(day), format!("day_{i}"))])
            .collect(),
    }
}

pub fn performance_keyboard(day: &FestivalDay, offset: FixedOffset) -> InlineKeyboardMarkup {
    let mut rows: Vec<_> = day
        .performances
        .iter()
        .map(|p| {
            vec![button(
                format!("{} ({})", p.name, local_time(p, offset)),
                format!("band_{}", p.id),
            )]
        })
        .collect();
    rows.push(back_row());
    InlineKeyboardMarkup {
        inline_keyboard: rows,
    }
}

/// Five toggles laid out as [5], [15, 30], [60, 120], then back.
pub fn reminder_keyboard(performance: usize, enabled: &[LeadTime]) -> InlineKeyboardMarkup {
    let toggle = |lead: LeadTime| {
        let on = enabled.contains(&lead);
        let mark = if on { "✅" } else { "⬜" };
        // pressing an enabled toggle disables it
        button(
            format!("{} {}", mark, lead.button_label()),
            alert_callback_data(!on, lead, performance),
        )
    };

    InlineKeyboardMarkup {
        inline_keyboard: vec![
            vec![toggle(LeadTime::Min5)],
            vec![toggle(LeadTime::Min15), toggle(LeadTime::Min30)],
            vec![toggle(LeadTime::Hour1), toggle(LeadTime::Hour2)],
            back_row(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cest() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    fn lineup() -> Lineup {
        let performance = |name: &str, hour, stage: &str| Performance {
            id: 0,
            name: name.to_string(),
            start: Utc.with_ymd_and_hms(2024, 8, 15, hour, 0, 0).unwrap(),
            stage: stage.to_string(),
        };
        Lineup::new(
            vec![
                performance("Alpha", 18, "Main"),
                performance("Beta & Co", 19, "Tent"),
            ],
            cest(),
        )
    }

    #[test]
    fn renders_day_with_now_playing_marker() {
        let lineup = lineup();
        let now = Utc.with_ymd_and_hms(2024, 8, 15, 18, 30, 0).unwrap();

        let text = render_day(&lineup.days()[0], cest(), lineup.now_playing(now));

        assert_eq!(
            text,
            "📅 Thursday, August 15\n\
             --------------------\n\
             🎸 20:00  Alpha (M)\n      \
             21:00  Beta &amp; Co (T)\n"
        );
    }

    #[test]
    fn timetable_separates_days() {
        let lineup = Lineup::new(
            vec![
                Performance {
                    id: 0,
                    name: "Alpha".to_string(),
                    start: Utc.with_ymd_and_hms(2024, 8, 15, 18, 0, 0).unwrap(),
                    stage: "Main".to_string(),
                },
                Performance {
                    id: 0,
                    name: "Gamma".to_string(),
                    start: Utc.with_ymd_and_hms(2024, 8, 16, 18, 0, 0).unwrap(),
                    stage: "Main".to_string(),
                },
            ],
            cest(),
        );
        let now = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();

        let text = render_timetable(&lineup, now);

        assert!(text.contains("Thursday, August 15"));
        assert!(text.contains("(M)\n\n📅 Friday, August 16"));
    }

    #[test]
    fn reminder_keyboard_reflects_enabled_state() {
        let keyboard = reminder_keyboard(3, &[LeadTime::Min30]);
        let rows = &keyboard.inline_keyboard;

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][0], button("⬜ 5 min", "alert_a_5min_3"));
        assert_eq!(rows[1][1], button("✅ 30 min", "alert_d_30min_3"));
        assert_eq!(rows[2][1], button("⬜ 2 hours", "alert_a_2hours_3"));
        assert_eq!(rows[3][0], button("🔙 Back", "back"));
    }

    #[test]
    fn performance_keyboard_uses_ids() {
        let lineup = lineup();
        let keyboard = performance_keyboard(&lineup.days()[0], cest());

        assert_eq!(keyboard.inline_keyboard[1][0], button("Beta & Co (21:00)", "band_1"));
        assert_eq!(keyboard.inline_keyboard.last().unwrap()[0].callback_data, "back");
    }

    #[test]
    fn day_keyboard_lists_every_day() {
        let keyboard = day_keyboard(&lineup());
        assert_eq!(
            keyboard.inline_keyboard,
            vec![vec![button("Thursday, August 15", "day_0")]]
        );
    }
}
