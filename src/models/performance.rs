use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

/// Raw lineup entry as written in the schedule file.
#[derive(Debug, Clone, Deserialize)]
pub struct LineupEntry {
    pub date: String,
    pub time: String,
    pub band: String,
    pub stage: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Performance {
    /// Position in the start-time ordered lineup.
    pub id: usize,
    pub name: String,
    pub start: DateTime<Utc>,
    pub stage: String,
}

impl Performance {
    pub fn stage_initial(&self) -> char {
        self.stage.chars().next().unwrap_or('?')
    }
}

/// All performances starting on one festival-local calendar day.
#[derive(Debug, Clone)]
pub struct FestivalDay {
    pub date: NaiveDate,
    pub performances: Vec<Performance>,
}
