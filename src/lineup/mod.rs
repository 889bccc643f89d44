mod loader;

pub use loader::load_lineup_file;

use chrono::{DateTime, Duration, FixedOffset, Utc};

use crate::models::{FestivalDay, Performance};

/// How long the last act of a day counts as playing.
const LAST_SET_LENGTH_MINUTES: i64 = 60;

/// The festival schedule, loaded once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Lineup {
    days: Vec<FestivalDay>,
    offset: FixedOffset,
}

impl Lineup {
    /// Sorts by start time, assigns ids and groups by festival-local date.
    pub fn new(mut performances: Vec<Performance>, offset: FixedOffset) -> Self {
        performances.sort_by_key(|p| p.start);

        let mut days: Vec<FestivalDay> = Vec::new();
        for (id, mut performance) in performances.into_iter().enumerate() {
            performance.id = id;
            let date = performance.start.with_timezone(&offset).date_naive();
            match days.last_mut() {
                Some(day) if day.date == date => day.performances.push(performance),
                _ => days.push(FestivalDay {
                    date,
                    performances: vec![performance],
                }),
            }
        }

        Self { days, offset }
    }

    pub fn days(&self) -> &[FestivalDay] {
        &self.days
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.days.iter().map(|d| d.performances.len()).sum()
    }

    pub fn performances(&self) -> impl Iterator<Item = &Performance> {
        self.days.iter().flat_map(|d| d.performances.iter())
    }

    pub fn performance(&self, id: usize) -> Option<&Performance> {
        self.performances().find(|p| p.id == id)
    }

    /// Start time of the named performance, if it is in the lineup.
    pub fn resolve(&self, name: &str) -> Option<DateTime<Utc>> {
        self.performances().find(|p| p.name == name).map(|p| p.start)
    }

    /// The day whose festival-local date matches `now`.
    pub fn today(&self, now: DateTime<Utc>) -> Option<&FestivalDay> {
        let date = now.with_timezone(&self.offset).date_naive();
        self.days.iter().find(|d| d.date == date)
    }

    pub fn now_playing(&self, now: DateTime<Utc>) -> Option<&Performance> {
        self.days.iter().find_map(|day| {
            now_playing_index(day, now).map(|i| &day.performances[i])
        })
    }
}

/// A set runs until the next one of the same day starts.
fn now_playing_index(day: &FestivalDay, now: DateTime<Utc>) -> Option<usize> {
    let performances = &day.performances;
    performances.iter().enumerate().position(|(i, p)| {
        let end = performances
            .get(i + 1)
            .map(|next| next.start)
            .unwrap_or(p.start + Duration::minutes(LAST_SET_LENGTH_MINUTES));
        now >= p.start && now < end
    })
}
