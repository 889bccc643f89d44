use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

/// How long before a performance a reminder fires.
///
/// Each variant is stored as its own row, keyed together with the subscriber
/// and the performance name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LeadTime {
    Min5,
    Min15,
    Min30,
    Hour1,
    Hour2,
}

impl LeadTime {
    pub const ALL: [LeadTime; 5] = [
        LeadTime::Min5,
        LeadTime::Min15,
        LeadTime::Min30,
        LeadTime::Hour1,
        LeadTime::Hour2,
    ];

    pub fn minutes(self) -> i64 {
        match self {
            LeadTime::Min5 => 5,
            LeadTime::Min15 => 15,
            LeadTime::Min30 => 30,
            LeadTime::Hour1 => 60,
            LeadTime::Hour2 => 120,
        }
    }

    pub fn from_minutes(minutes: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|lead| lead.minutes() == minutes)
    }

    /// Label used in the reminder message.
    pub fn label(self) -> &'static str {
        match self {
            LeadTime::Min5 => "5 minutes",
            LeadTime::Min15 => "15 minutes",
            LeadTime::Min30 => "30 minutes",
            LeadTime::Hour1 => "1 hour",
            LeadTime::Hour2 => "2 hours",
        }
    }

    /// Short label shown on toggle buttons.
    pub fn button_label(self) -> &'static str {
        match self {
            LeadTime::Min5 => "5 min",
            LeadTime::Min15 => "15 min",
            LeadTime::Min30 => "30 min",
            LeadTime::Hour1 => "1 hour",
            LeadTime::Hour2 => "2 hours",
        }
    }

    /// Token used inside callback data.
    pub fn token(self) -> &'static str {
        match self {
            LeadTime::Min5 => "5min",
            LeadTime::Min15 => "15min",
            LeadTime::Min30 => "30min",
            LeadTime::Hour1 => "1hour",
            LeadTime::Hour2 => "2hours",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|lead| lead.token() == token)
    }
}

impl ToSql for LeadTime {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.minutes()))
    }
}

impl FromSql for LeadTime {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let minutes = i64::column_result(value)?;
        LeadTime::from_minutes(minutes).ok_or(FromSqlError::OutOfRange(minutes))
    }
}

/// A stored reminder: one subscriber, one performance, one lead time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: i64,
    pub subscriber: i64,
    pub performance: String,
    pub lead: LeadTime,
    pub due_at: DateTime<Utc>,
}

impl Subscription {
    pub fn message(&self) -> String {
        format!("🔔 {} until \"{}\"", self.lead.label(), self.performance)
    }
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub subscriber: i64,
    pub performance: String,
    pub lead: LeadTime,
    pub due_at: DateTime<Utc>,
}
